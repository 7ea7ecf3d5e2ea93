use url::Url;

/// The page the client runs on: its location and the agent string it reports
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub url: Url,
    pub user_agent: String,
}

impl Page {
    pub fn new(url: Url, user_agent: impl Into<String>) -> Self {
        Self {
            url,
            user_agent: user_agent.into(),
        }
    }

    pub fn parse(url: &str, user_agent: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?, user_agent))
    }

    /// Scheme used to reach the collection host: `http:` only from `http:` pages
    pub fn collection_scheme(&self) -> &'static str {
        if self.url.scheme() == "http" {
            "http:"
        } else {
            "https:"
        }
    }

    /// Hostname without port, empty for hostless pages (`file:`)
    pub fn host(&self) -> String {
        self.url.host_str().unwrap_or_default().to_string()
    }

    /// Raw query string without the leading `?`, if non-empty
    pub fn query(&self) -> Option<&str> {
        self.url.query().filter(|q| !q.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str) -> Page {
        Page::parse(url, "test-agent").unwrap()
    }

    #[test]
    fn test_collection_scheme() {
        assert_eq!(page("http://app.example/").collection_scheme(), "http:");
        assert_eq!(page("https://app.example/").collection_scheme(), "https:");
        assert_eq!(page("file:///tmp/index.html").collection_scheme(), "https:");
        assert_eq!(page("chrome-extension://abcdef/popup.html").collection_scheme(), "https:");
    }

    #[test]
    fn test_host_and_query() {
        let p = page("https://app.example:8443/path?utm_source=x");
        assert_eq!(p.host(), "app.example");
        assert_eq!(p.query(), Some("utm_source=x"));

        let p = page("file:///tmp/index.html?");
        assert_eq!(p.host(), "");
        assert_eq!(p.query(), None);
    }
}
