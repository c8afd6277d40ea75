use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 50;
pub const MAX_PER_PAGE: u64 = 500;
/// Block numbers and log indexes are stored as BIGINT.
pub const MAX_POSITION: u64 = i64::MAX as u64;

pub fn items_count(count: Option<u64>) -> u64 {
    count.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PlaceholderPagination {
    pub items_count: Option<u64>,
}

/// Query string of `/api/logs`. Filters are carried over into
/// `next_page_params`; `block_number` and `log_index` mark the last item of
/// the previous page.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LogsPagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
    pub items_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl LogsPagination {
    /// First block or position parameter too large to be stored, if any.
    pub fn out_of_range(&self) -> Option<(&'static str, u64)> {
        [
            ("from_block", self.from_block),
            ("to_block", self.to_block),
            ("block_number", self.block_number),
            ("log_index", self.log_index),
        ]
        .into_iter()
        .find_map(|(name, value)| value.filter(|v| *v > MAX_POSITION).map(|v| (name, v)))
    }

    /// Keyset cursor, present only when both halves are given.
    pub fn after(&self) -> Option<(u64, u64)> {
        self.block_number.zip(self.log_index)
    }

    pub fn next_page(&self, block_number: u64, log_index: u64) -> Self {
        Self {
            items_count: Some(items_count(self.items_count)),
            block_number: Some(block_number),
            log_index: Some(log_index),
            ..self.clone()
        }
    }
}
