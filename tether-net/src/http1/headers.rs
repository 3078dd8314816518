use super::types::Header;

/// Headers that legitimately repeat; setting one of these appends instead of replacing.
const MULTI_VALUED: &[&str] = &[
    "set-cookie",
    "www-authenticate",
    "proxy-authenticate",
    "via",
    "warning",
];

/// Ordered header map with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_multi_valued(name: &str) -> bool {
        MULTI_VALUED
            .iter()
            .any(|known| known.eq_ignore_ascii_case(name.trim()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True when any value of `name` lists `token` in its comma-separated elements.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name).any(|value| {
            value
                .split(',')
                .any(|element| element.trim().eq_ignore_ascii_case(token))
        })
    }

    /// Last write wins for ordinary headers: the value replaces the existing entry in
    /// place and any later duplicates are dropped. Multi-valued headers append.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(Header::new(name, value));
    }

    pub fn insert(&mut self, header: Header) {
        if Self::is_multi_valued(&header.name) {
            self.entries.push(header);
            return;
        }
        match self
            .entries
            .iter()
            .position(|existing| existing.name.eq_ignore_ascii_case(&header.name))
        {
            Some(index) => {
                let name = header.name.clone();
                self.entries[index] = header;
                let mut seen = 0usize;
                self.entries.retain(|existing| {
                    if !existing.name.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.entries.push(header),
        }
    }

    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Header::new(name, value));
    }

    /// Appends `header` as is, keeping any earlier value with the same name.
    pub fn push(&mut self, header: Header) {
        self.entries.push(header);
    }

    /// Removes every value of `name`; returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|header| !header.name.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<Header> for Headers {
    fn from_iter<T: IntoIterator<Item = Header>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for header in iter {
            headers.insert(header);
        }
        headers
    }
}

impl Extend<Header> for Headers {
    fn extend<T: IntoIterator<Item = Header>>(&mut self, iter: T) {
        for header in iter {
            self.insert(header);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Headers;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.set("Content-Type", "text/plain");
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert!(headers.contains("CONTENT-TYPE"));
    }

    #[test]
    fn set_replaces_in_place() {
        let mut headers = Headers::new();
        headers.set("Accept", "a");
        headers.set("X-Trace", "1");
        headers.set("accept", "b");

        let names: Vec<_> = headers.iter().map(|header| header.name.as_str()).collect();
        assert_eq!(names, vec!["accept", "X-Trace"]);
        assert_eq!(headers.get("Accept"), Some("b"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn multi_valued_headers_accumulate() {
        let mut headers = Headers::new();
        headers.set("Set-Cookie", "a=1");
        headers.set("set-cookie", "b=2");
        assert_eq!(headers.get_all("Set-Cookie").collect::<Vec<_>>(), vec!["a=1", "b=2"]);
    }

    #[test]
    fn token_matching_splits_on_commas() {
        let mut headers = Headers::new();
        headers.set("Transfer-Encoding", "gzip, Chunked");
        assert!(headers.has_token("transfer-encoding", "chunked"));
        assert!(!headers.has_token("transfer-encoding", "deflate"));
    }

    #[test]
    fn remove_drops_all_values() {
        let mut headers = Headers::new();
        headers.append("Via", "a");
        headers.append("Via", "b");
        assert!(headers.remove("via"));
        assert!(headers.is_empty());
        assert!(!headers.remove("via"));
    }
}
