extern crate anyhow;
extern crate flexi_logger;
extern crate image;
extern crate reqwest;
extern crate rppal;
extern crate serde_json;
extern crate std;

pub type DashResult<T> = std::result::Result<T, DashError>;

#[derive(Debug)]
pub enum DashError {
    AnyhowError(anyhow::Error),
    GpioError(rppal::gpio::Error),
    HttpError(reqwest::Error),
    ImageError(image::ImageError),
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    LoggerError(flexi_logger::FlexiLoggerError),
    SpiError(rppal::spi::Error),
    StringError(String),
}

pub fn make_error(message: &str) -> DashError {
    return DashError::StringError(message.to_string());
}

impl std::fmt::Display for DashError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            DashError::AnyhowError(ref err) => {
                return write!(f, "{:#}", err);
            },
            DashError::GpioError(ref err) => {
                return write!(f, "GPIO Error: {}", err);
            },
            DashError::HttpError(ref err) => {
                return write!(f, "HTTP Error: {}", err);
            },
            DashError::ImageError(ref err) => {
                return write!(f, "Image Error: {}", err);
            },
            DashError::IoError(ref err) => {
                return write!(f, "IO Error: {}", err);
            },
            DashError::JsonError(ref err) => {
                return write!(f, "JSON Error: {}", err);
            },
            DashError::LoggerError(ref err) => {
                return write!(f, "Logger Error: {}", err);
            },
            DashError::SpiError(ref err) => {
                return write!(f, "SPI Error: {}", err);
            },
            DashError::StringError(ref msg) => {
                return write!(f, "Error: {}", msg);
            },
        }
    }
}

impl std::error::Error for DashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            DashError::AnyhowError(ref err) => {
                let inner: &(dyn std::error::Error + 'static) = err.as_ref();
                Some(inner)
            },
            DashError::GpioError(ref err) => Some(err),
            DashError::HttpError(ref err) => Some(err),
            DashError::ImageError(ref err) => Some(err),
            DashError::IoError(ref err) => Some(err),
            DashError::JsonError(ref err) => Some(err),
            DashError::LoggerError(ref err) => Some(err),
            DashError::SpiError(ref err) => Some(err),
            DashError::StringError(_) => None,
        }
    }
}

impl From<anyhow::Error> for DashError {
    fn from(err: anyhow::Error) -> DashError {
        return DashError::AnyhowError(err);
    }
}

impl From<rppal::gpio::Error> for DashError {
    fn from(err: rppal::gpio::Error) -> DashError {
        return DashError::GpioError(err);
    }
}

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> DashError {
        return DashError::HttpError(err);
    }
}

impl From<image::ImageError> for DashError {
    fn from(err: image::ImageError) -> DashError {
        return DashError::ImageError(err);
    }
}

impl From<std::io::Error> for DashError {
    fn from(err: std::io::Error) -> DashError {
        return DashError::IoError(err);
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> DashError {
        return DashError::JsonError(err);
    }
}

impl From<flexi_logger::FlexiLoggerError> for DashError {
    fn from(err: flexi_logger::FlexiLoggerError) -> DashError {
        return DashError::LoggerError(err);
    }
}

impl From<rppal::spi::Error> for DashError {
    fn from(err: rppal::spi::Error) -> DashError {
        return DashError::SpiError(err);
    }
}
