//! Browser launch errors.

use thiserror::Error;

use crate::cdp::CdpError;
use crate::driver::DriverError;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Chrome not found. Set browser.chrome_path or install Google Chrome.")]
    ChromeNotFound,

    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    #[error("No free debugging port near {0}")]
    NoFreePort(u16),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CdpError> for BrowserError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ConnectionFailed(msg) | CdpError::ChromeNotAvailable(msg) => {
                BrowserError::ConnectionFailed(msg)
            }
            other => BrowserError::Driver(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_unavailable_is_connection_failure() {
        let err = BrowserError::from(CdpError::ChromeNotAvailable("http://127.0.0.1:9300".into()));
        assert!(matches!(err, BrowserError::ConnectionFailed(_)));
    }

    #[test]
    fn test_cdp_script_error_goes_through_driver() {
        let err = BrowserError::from(CdpError::JavaScript("boom".into()));
        assert!(matches!(err, BrowserError::Driver(DriverError::Script(_))));
    }
}
