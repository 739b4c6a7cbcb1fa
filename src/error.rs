//! Process-level error type

use thiserror::Error;

use crate::api::ServerError;
use crate::feed::FeedError;
use crate::history::HistoryError;
use crate::persistence::StoreError;
use crate::settings::SettingsError;
use crate::tcp::TcpServerError;
use crate::updater::UpdaterError;

/// Any error that stops the process
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Updater(#[from] UpdaterError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Tcp(#[from] TcpServerError),
}

pub type AppResult<T> = Result<T, AppError>;
