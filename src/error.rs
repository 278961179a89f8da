use std::process::ExitCode;

use crate::repo::RepoError;

/// Failure of a front-end command, already phrased for the user.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")] Validation(String),
    #[error("Item not found. Please check the item name.")] NotFound,
    #[error("Incorrect verification password.")] Unauthorized,
    #[error("Could not save data: {0}")] Storage(String),
    #[error("Cancelled.")] Cancelled,
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Validation(msg) => AppError::Validation(msg),
            RepoError::NotFound => AppError::NotFound,
            RepoError::Unauthorized => AppError::Unauthorized,
            RepoError::Storage(s) => AppError::Storage(s.to_string()),
        }
    }
}

impl AppError {
    pub fn code(&self) -> u8 {
        match self {
            AppError::Validation(_) => 2,
            AppError::NotFound => 3,
            AppError::Unauthorized => 4,
            AppError::Storage(_) => 5,
            AppError::Cancelled => 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }
}
