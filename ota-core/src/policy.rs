//! SSL policy applied to every URL the updater requests

const HTTPS_PREFIX: &str = "https://";

fn is_https(url: &str) -> bool {
    url.get(..HTTPS_PREFIX.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(HTTPS_PREFIX))
}

/// Fixed when the session is created from its root manifest URL. A session
/// rooted at `https://` never makes a plain-HTTP request, redirects and
/// firmware downloads included.
///
/// ```
/// use ota_core::UrlPolicy;
///
/// let policy = UrlPolicy::for_root("https://updates.example.com/cfg.txt");
/// assert_eq!(policy, UrlPolicy::RequireHttps);
/// assert!(!policy.permits("http://updates.example.com/fw.bin"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPolicy {
    RequireHttps,
    AllowPlain,
}

impl UrlPolicy {
    pub fn for_root(root_url: &str) -> Self {
        if is_https(root_url) {
            UrlPolicy::RequireHttps
        } else {
            UrlPolicy::AllowPlain
        }
    }

    pub fn permits(&self, url: &str) -> bool {
        match self {
            UrlPolicy::RequireHttps => is_https(url),
            UrlPolicy::AllowPlain => true,
        }
    }
}
