use thiserror::Error;

use crate::model::{TagError, ValidationError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Tag(#[from] TagError),
}
