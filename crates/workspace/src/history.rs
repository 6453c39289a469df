//! Navigation history
//!
//! The active url id is carried in a query parameter of the page location so
//! that back/forward navigation can restore it.

use parking_lot::Mutex;
use url::form_urlencoded;

/// Browser-style navigation history
pub trait NavigationHistory: Send + Sync {
    /// Add a new entry after the current one
    fn push(&self, location: &str);

    /// Overwrite the current entry
    fn replace(&self, location: &str);

    /// Location of the current entry
    fn current(&self) -> Option<String>;
}

/// History that records nothing
#[derive(Debug, Default)]
pub struct NoHistory;

impl NavigationHistory for NoHistory {
    fn push(&self, _location: &str) {}

    fn replace(&self, _location: &str) {}

    fn current(&self) -> Option<String> {
        None
    }
}

/// Encodes the active url id into a location and back
#[derive(Debug, Clone)]
pub struct HistoryCodec {
    param: String,
}

impl HistoryCodec {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
        }
    }

    pub fn encode(&self, url_id: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.param, url_id)
            .finish();
        format!("?{}", query)
    }

    /// Extract the url id from a location such as `/dash?url=u1#top`
    pub fn decode(&self, location: &str) -> Option<String> {
        let without_fragment = location.split('#').next().unwrap_or_default();
        let (_, query) = without_fragment.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == self.param.as_str())
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    }
}

impl Default for HistoryCodec {
    fn default() -> Self {
        Self::new("url")
    }
}

/// In-process history stack with back/forward navigation
#[derive(Debug, Default)]
pub struct MemoryHistory {
    inner: Mutex<HistoryStack>,
}

#[derive(Debug, Default)]
struct HistoryStack {
    entries: Vec<String>,
    index: usize,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History starting at `location`
    pub fn starting_at(location: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(HistoryStack {
                entries: vec![location.into()],
                index: 0,
            }),
        }
    }

    /// Step back; returns the location to hand to popstate handling
    pub fn back(&self) -> Option<String> {
        let mut stack = self.inner.lock();
        if stack.index == 0 || stack.entries.is_empty() {
            return None;
        }
        stack.index -= 1;
        stack.entries.get(stack.index).cloned()
    }

    /// Step forward; returns the location to hand to popstate handling
    pub fn forward(&self) -> Option<String> {
        let mut stack = self.inner.lock();
        if stack.index + 1 >= stack.entries.len() {
            return None;
        }
        stack.index += 1;
        stack.entries.get(stack.index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn entries(&self) -> Vec<String> {
        self.inner.lock().entries.clone()
    }
}

impl NavigationHistory for MemoryHistory {
    fn push(&self, location: &str) {
        let mut stack = self.inner.lock();
        if stack.entries.is_empty() {
            stack.entries.push(location.to_string());
            stack.index = 0;
            return;
        }
        let keep = stack.index + 1;
        stack.entries.truncate(keep);
        stack.entries.push(location.to_string());
        stack.index = keep;
    }

    fn replace(&self, location: &str) {
        let mut stack = self.inner.lock();
        let index = stack.index;
        match stack.entries.get_mut(index) {
            Some(entry) => *entry = location.to_string(),
            None => {
                stack.entries.push(location.to_string());
                stack.index = stack.entries.len() - 1;
            }
        }
    }

    fn current(&self) -> Option<String> {
        let stack = self.inner.lock();
        stack.entries.get(stack.index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_encode() {
        let codec = HistoryCodec::default();
        assert_eq!(codec.encode("u1"), "?url=u1");
        assert_eq!(codec.encode("a b&c"), "?url=a+b%26c");
    }

    #[test_case("?url=u1", Some("u1") ; "bare query")]
    #[test_case("/dash?tab=2&url=u2#frag", Some("u2") ; "path params and fragment")]
    #[test_case("?url=a+b%26c", Some("a b&c") ; "escaped")]
    #[test_case("/dash", None ; "no query")]
    #[test_case("?url=", None ; "empty value")]
    #[test_case("?other=u1", None ; "other param")]
    fn test_decode(location: &str, expected: Option<&str>) {
        assert_eq!(HistoryCodec::default().decode(location).as_deref(), expected);
    }

    #[test]
    fn test_custom_param() {
        let codec = HistoryCodec::new("frame");
        assert_eq!(codec.decode(&codec.encode("u3")).as_deref(), Some("u3"));
        assert_eq!(codec.decode("?url=u3"), None);
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::starting_at("/");
        history.push("?url=u1");
        history.push("?url=u2");
        assert_eq!(history.back().as_deref(), Some("?url=u1"));

        history.push("?url=u3");
        assert_eq!(history.entries(), vec!["/", "?url=u1", "?url=u3"]);
        assert_eq!(history.forward(), None);
    }

    #[test]
    fn test_replace_current() {
        let history = MemoryHistory::new();
        history.replace("?url=u1");
        history.replace("?url=u2");
        assert_eq!(history.len(), 1);
        assert_eq!(history.current().as_deref(), Some("?url=u2"));
    }

    #[test]
    fn test_back_at_start() {
        let history = MemoryHistory::starting_at("/");
        assert_eq!(history.back(), None);
        assert_eq!(history.current().as_deref(), Some("/"));
    }
}
