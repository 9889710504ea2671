use crate::form::{CharField, DecimalField};

pub const PASSWORD_MIN_LENGTH: usize = 5;

pub const EMAIL_FIELD: CharField = CharField::required(255);
pub const NAME_FIELD: CharField = CharField::optional(Some(255));
pub const BIO_FIELD: CharField = CharField::optional(Some(600));
pub const SHORT_DESC_FIELD: CharField = CharField::optional(Some(255));
pub const IMAGE_FIELD: CharField = CharField::optional(Some(255));

pub const TITLE_FIELD: CharField = CharField::required(255);
pub const DESCRIPTION_FIELD: CharField = CharField::optional(None);
pub const LINK_FIELD: CharField = CharField::optional(Some(255));
pub const LABEL_NAME_FIELD: CharField = CharField::required(255);
pub const AMOUNT_TYPE_FIELD: CharField = CharField::required(50);

pub const PRICE_FIELD: DecimalField = DecimalField {
    max_digits: 5,
    decimal_places: 2,
};
pub const AMOUNT_FIELD: DecimalField = DecimalField {
    max_digits: 6,
    decimal_places: 0,
};

pub const UPLOADS_DIR: &str = "uploads";
pub const IMAGE_EXTENSION_MAX_LENGTH: usize = 16;

pub const EMAIL_QUEUE_KEY: &str = "recipe-api:jobs";

pub const WELCOME_SUBJECT: &str = "Welcome to Recipe API";
pub const WELCOME_MESSAGE: &str = "Your account has been created. Happy cooking!";
pub const LOGIN_REPORT_SUBJECT: &str = "Logins for last day";
