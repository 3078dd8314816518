/// One challenge from a `WWW-Authenticate` or `Proxy-Authenticate` header.
/// Parameter names are lowercased; values are unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    pub params: Vec<(String, String)>,
}

impl Challenge {
    fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            params: Vec::new(),
        }
    }

    pub fn is_scheme(&self, scheme: &str) -> bool {
        self.scheme.eq_ignore_ascii_case(scheme)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn realm(&self) -> Option<&str> {
        self.param("realm")
    }
}

/// Parses every challenge across the given header values. Several challenges may share
/// one value (`Digest realm="a", nonce="n", Basic realm="a"`); malformed trailing input
/// ends parsing of that value without discarding the challenges already read.
pub fn parse_challenges<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<Challenge> {
    let mut challenges = Vec::new();
    for value in values {
        let mut cursor = Cursor::new(value);
        loop {
            cursor.skip_separators();
            let scheme = cursor.token();
            if scheme.is_empty() {
                break;
            }
            let mut challenge = Challenge::new(scheme);
            cursor.skip_ws();

            // token68 credentials (Negotiate, NTLM) carry no params we can answer with.
            let mark = cursor.pos;
            if cursor.skip_token68() {
                challenges.push(challenge);
                continue;
            }
            cursor.pos = mark;

            loop {
                cursor.skip_ws();
                let param_start = cursor.pos;
                let name = cursor.token();
                if name.is_empty() {
                    break;
                }
                cursor.skip_ws();
                if cursor.peek() != Some(b'=') {
                    // Start of the next challenge.
                    cursor.pos = param_start;
                    break;
                }
                cursor.bump();
                cursor.skip_ws();
                let value = if cursor.peek() == Some(b'"') {
                    cursor.quoted()
                } else {
                    cursor.token().to_string()
                };
                challenge.params.push((name.to_ascii_lowercase(), value));
                cursor.skip_ws();
                if cursor.peek() != Some(b',') {
                    break;
                }
                cursor.bump();
            }
            challenges.push(challenge);
        }
    }
    challenges
}

struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.bump();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b',')) {
            self.bump();
        }
    }

    fn slice(&self, start: usize) -> &'a str {
        std::str::from_utf8(&self.input[start..self.pos]).unwrap_or("")
    }

    fn token(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_tchar) {
            self.bump();
        }
        self.slice(start)
    }

    /// Skips a token68 only when it is the whole credential, i.e. followed by the end
    /// of input or a comma. `realm="x"` and `name=value` are left for the param parser.
    fn skip_token68(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(is_token68_char) {
            self.bump();
        }
        if self.pos == start {
            return false;
        }
        while self.peek() == Some(b'=') {
            self.bump();
        }
        self.skip_ws();
        matches!(self.peek(), None | Some(b','))
    }

    fn quoted(&mut self) -> String {
        self.bump();
        let mut value = Vec::new();
        while let Some(byte) = self.peek() {
            self.bump();
            match byte {
                b'"' => break,
                b'\\' => {
                    if let Some(escaped) = self.peek() {
                        value.push(escaped);
                        self.bump();
                    }
                }
                other => value.push(other),
            }
        }
        String::from_utf8_lossy(&value).into_owned()
    }
}

fn is_tchar(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

fn is_token68_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"-._~+/".contains(&byte)
}
