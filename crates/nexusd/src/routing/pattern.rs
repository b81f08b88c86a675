//! Route path patterns made of literal and `{name}` segments.

use super::errors::RouteTableError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// Compiled route path with optional `{name}` segments.
///
/// A variable matches exactly one non-empty path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub(crate) fn parse(raw: &str) -> Result<Self, RouteTableError> {
        let invalid = |reason| RouteTableError::InvalidPattern {
            pattern: raw.to_owned(),
            reason,
        };
        if !raw.starts_with('/') {
            return Err(invalid("patterns must start with '/'"));
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for part in raw.split('/').skip(1) {
            match part.strip_prefix('{').and_then(|rest| rest.strip_suffix('}')) {
                Some(name) => {
                    if name.is_empty() || name.contains(['{', '}', ':']) {
                        return Err(invalid("variables must be written as {name}"));
                    }
                    if names.contains(&name) {
                        return Err(invalid("variable names must be unique"));
                    }
                    names.push(name);
                    segments.push(Segment::Variable(name.to_owned()));
                }
                None if part.contains(['{', '}']) => {
                    return Err(invalid("variables must span a whole segment"));
                }
                None => segments.push(Segment::Literal(part.to_owned())),
            }
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Matches `path` and returns the captured variables in declaration order.
    pub(crate) fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let rest = path.strip_prefix('/')?;
        let mut parts = rest.split('/');
        let mut vars = Vec::new();
        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Variable(_) if part.is_empty() => return None,
                Segment::Variable(name) => vars.push((name.clone(), part.to_owned())),
            }
        }
        if parts.next().is_some() {
            return None;
        }
        Some(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pattern(raw: &str) -> PathPattern {
        PathPattern::parse(raw).expect("pattern should parse")
    }

    #[rstest]
    #[case("/", "/", true)]
    #[case("/", "/x", false)]
    #[case("/user", "/user", true)]
    #[case("/user", "/user/", false)]
    #[case("/user/profile", "/user/profile", true)]
    fn matches_static_paths(#[case] raw: &str, #[case] path: &str, #[case] expected: bool) {
        let compiled = pattern(raw);
        assert!(compiled.is_static());
        assert_eq!(compiled.captures(path).is_some(), expected);
    }

    #[test]
    fn captures_variables_in_order() {
        let compiled = pattern("/user/{id}/posts/{post}");
        assert!(!compiled.is_static());
        let vars = compiled
            .captures("/user/42/posts/7")
            .expect("path should match");
        assert_eq!(
            vars,
            vec![
                ("id".to_owned(), "42".to_owned()),
                ("post".to_owned(), "7".to_owned())
            ]
        );
    }

    #[rstest]
    #[case("/user/")]
    #[case("/user")]
    #[case("/user/42/extra")]
    fn variables_require_one_segment(#[case] path: &str) {
        assert!(pattern("/user/{id}").captures(path).is_none());
    }

    #[rstest]
    #[case("user")]
    #[case("/user/{}")]
    #[case("/user/{id:\\d+}")]
    #[case("/user/id{x}")]
    #[case("/{id}/{id}")]
    fn rejects_malformed_patterns(#[case] raw: &str) {
        assert!(matches!(
            PathPattern::parse(raw),
            Err(RouteTableError::InvalidPattern { .. })
        ));
    }
}
