use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Proxy(#[from] ulog_client::ClientError),
}
