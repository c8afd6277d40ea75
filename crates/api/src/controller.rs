use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::logs::LogFilter;
use tracing::{info, instrument};

use crate::{
    error::AppError,
    pagination::{items_count, LogsPagination},
    types::{LogResponse, StatusResponse},
    ApiResponse, ApiResult, AppState,
};

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.caught_up.is_caught_up() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::FAILED_DEPENDENCY, "backfilling")
    }
}

#[instrument(skip(state), fields(pagination_query = ?pagination_query))]
pub async fn get_logs(
    State(state): State<AppState>,
    Query(pagination_query): Query<LogsPagination>,
) -> ApiResult<Vec<LogResponse>, LogsPagination> {
    if let (Some(from), Some(to)) = (pagination_query.from_block, pagination_query.to_block) {
        if from > to {
            return Err(AppError::BadRequest(format!(
                "from_block ({}) is greater than to_block ({})",
                from, to
            )));
        }
    }

    if let Some((name, value)) = pagination_query.out_of_range() {
        return Err(AppError::BadRequest(format!(
            "{} ({}) is out of range",
            name, value
        )));
    }

    let per_page = items_count(pagination_query.items_count);
    let filter = LogFilter {
        chain_id: state.chain_id,
        address: pagination_query.address.clone(),
        topic0: pagination_query.topic0.clone(),
        from_block: pagination_query.from_block,
        to_block: pagination_query.to_block,
        after: pagination_query.after(),
        // One extra row tells whether another page exists.
        limit: per_page + 1,
    };

    let mut rows = state.query.logs(&filter).await?;
    let has_more = rows.len() as u64 > per_page;
    rows.truncate(per_page as usize);

    let next_page_params = match rows.last() {
        Some(last) if has_more => Some(
            pagination_query.next_page(last.block_number as u64, last.log_index as u64),
        ),
        _ => None,
    };

    let items = rows
        .into_iter()
        .map(LogResponse::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Internal(format!("Malformed stored topics: {}", e)))?;

    info!(count = items.len(), "Fetched logs");

    Ok(ApiResponse {
        success: true,
        items,
        next_page_params,
    })
}

#[instrument(skip_all)]
pub async fn get_status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let checkpoint = state.query.checkpoint(state.chain_id).await?;

    Ok(Json(StatusResponse {
        chain_id: state.chain_id,
        schema_version: state.schema_version.clone(),
        checkpoint_block: checkpoint.and_then(|c| c.last_updated_block_number),
        latest_chain_block: state.progress.latest_chain_block(),
        last_applied_block: state.progress.last_applied_block(),
        caught_up: state.caught_up.is_caught_up(),
    }))
}
