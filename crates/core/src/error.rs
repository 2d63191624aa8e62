use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("price parse error: {0}")]
    PriceParse(String),

    #[error("{0}")]
    Other(String),
}
