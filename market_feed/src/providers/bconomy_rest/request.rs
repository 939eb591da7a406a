use serde::Serialize;

/// Request body understood by the data endpoint.
///
/// Serialises as `{"type":"marketListings","itemId":N}` or
/// `{"type":"marketPreview"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataRequest {
    MarketListings {
        #[serde(rename = "itemId")]
        item_id: i32,
    },
    MarketPreview,
}
