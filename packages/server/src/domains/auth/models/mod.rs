mod identity;
mod phone;
mod role;

pub use identity::{
    is_valid_email, normalize_email, IdentityRecord, NewIdentity, EMAIL_UNIQUE_CONSTRAINT,
    PHONE_UNIQUE_CONSTRAINT,
};
pub use phone::{
    normalize_phone, PhoneError, PhoneNormalizer, PhoneNumber, DEFAULT_COUNTRY_CODE,
};
pub use role::{RoleId, UnknownRole};
