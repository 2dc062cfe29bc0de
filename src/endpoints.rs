//! Crunchyroll Beta API endpoint URLs
//!
//! Paths are the remote contract and must not be changed. CMS endpoints
//! interpolate the server-issued `bucket` value, which starts with a slash
//! (e.g. `/us/xxxx`).

/// Default API host. Overridable per client instance for testing.
pub const API_HOST: &str = "https://beta-api.crunchyroll.com";

pub fn token(base: &str) -> String {
    format!("{base}/auth/v1/token")
}

pub fn index(base: &str) -> String {
    format!("{base}/index/v2")
}

pub fn profile(base: &str) -> String {
    format!("{base}/accounts/v1/me/profile")
}

pub fn search(base: &str) -> String {
    format!("{base}/content/v1/search")
}

pub fn series(base: &str, bucket: &str, series_id: &str) -> String {
    format!("{base}/cms/v2{bucket}/series/{series_id}")
}

pub fn seasons(base: &str, bucket: &str) -> String {
    format!("{base}/cms/v2{bucket}/seasons")
}

pub fn episodes(base: &str, bucket: &str) -> String {
    format!("{base}/cms/v2{bucket}/episodes")
}

pub fn streams(base: &str, bucket: &str, stream_id: &str) -> String {
    format!("{base}/cms/v2{bucket}/videos/{stream_id}/streams")
}

pub fn similar(base: &str, account_id: &str) -> String {
    format!("{base}/content/v1/{account_id}/similar_to")
}

pub fn news_feed(base: &str) -> String {
    format!("{base}/content/v1/news_feed")
}
