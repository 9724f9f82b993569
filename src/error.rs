use thiserror::Error;

pub type MapResult<T> = Result<T, MapError>;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("invalid viewport size: width={width}, height={height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown render profile `{0}`")]
    UnknownRenderProfile(String),

    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("unknown cluster id: level={level}, index={index}")]
    UnknownCluster { level: u8, index: u32 },
}
