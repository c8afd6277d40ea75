/// Why an RPC log could not be turned into a stored record.
#[derive(Debug)]
pub enum ParserError {
    MissingBlockNumber,
    MissingLogIndex { block_number: u64 },
    InvalidAddress { value: String },
}

impl std::error::Error for ParserError {}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserError::MissingBlockNumber => write!(f, "Missing block number in log"),
            ParserError::MissingLogIndex { block_number } => {
                write!(f, "Missing log index in log at block {}", block_number)
            }
            ParserError::InvalidAddress { value } => {
                write!(f, "Invalid contract address: {}", value)
            }
        }
    }
}
