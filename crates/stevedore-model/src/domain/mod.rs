mod env;
pub use env::Env;

mod flags;
pub use flags::Flags;

mod labels;
pub use labels::Labels;

mod identity;
pub use identity::{IdentityLookup, ServiceIdentity};

mod status;
pub use status::ContainerStatus;

mod constants;
pub use constants::{
    DEFAULT_NAMESPACE, DEFAULT_SERVICE_ID_LABELS, ENV_SEGMENT, FLAG_IMAGE, FLAG_SERVICE,
    IMAGE_TITLE_LABELS, OPTIONS_DEPRECATED_KEY, OPTIONS_FLAGS_KEY, OPTIONS_USER_KEY,
};
