pub fn base_url(server_url: &str) -> String {
    server_url.trim_end_matches('/').to_string()
}
