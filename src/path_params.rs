use std::{str::Utf8Error, sync::Arc};

use http::Extensions;

use crate::request::Request;

#[derive(Clone, Debug)]
pub(crate) enum PathParams {
    Params(Vec<(Arc<str>, PercentDecodedStr)>),
    InvalidUtf8InPathParam { key: Arc<str> },
}

impl Default for PathParams {
    fn default() -> Self {
        Self::Params(Default::default())
    }
}

impl PathParams {
    pub(crate) fn insert<'a>(&mut self, params: impl Iterator<Item = (&'a str, &'a str)>) {
        let PathParams::Params(current) = self else {
            return;
        };

        let params = params
            .map(|(k, v)| {
                let key = Arc::<str>::from(k);

                match PercentDecodedStr::new(v) {
                    Ok(decoded) => Ok((key, decoded)),
                    Err(_) => Err(key),
                }
            })
            .collect::<Result<Vec<_>, _>>();

        match params {
            Ok(params) => {
                current.extend(params);
            }
            Err(key) => {
                *self = PathParams::InvalidUtf8InPathParam { key };
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PercentDecodedStr(Arc<str>);

impl PercentDecodedStr {
    fn new(s: &str) -> Result<Self, Utf8Error> {
        percent_encoding::percent_decode_str(s)
            .decode_utf8()
            .map(|decoded| Self(decoded.as_ref().into()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

/// Looks up the named path parameter matched for this request.
///
/// Returns `None` when the name does not appear in the matched pattern, or
/// when a matched segment percent-decoded to invalid UTF-8.
pub fn path_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    path_param_from_extensions(&req.head.extensions, key)
}

/// Same as [`path_param`], for call sites that only hold the request's
/// extensions.
pub fn path_param_from_extensions<'a>(extensions: &'a Extensions, key: &str) -> Option<&'a str> {
    match extensions.get::<PathParams>()? {
        PathParams::Params(params) => params
            .iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v.as_str()),
        PathParams::InvalidUtf8InPathParam { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decoding_and_lookup() {
        let mut params = PathParams::default();
        params.insert([("name", "a%20b"), ("id", "7")].into_iter());

        let mut extensions = Extensions::new();
        extensions.insert(params);

        assert_eq!(path_param_from_extensions(&extensions, "name"), Some("a b"));
        assert_eq!(path_param_from_extensions(&extensions, "id"), Some("7"));
        assert_eq!(path_param_from_extensions(&extensions, "missing"), None);
    }

    #[test]
    fn invalid_utf8_poisons_the_set() {
        let mut params = PathParams::default();
        params.insert([("id", "7"), ("name", "%FF")].into_iter());

        let mut extensions = Extensions::new();
        extensions.insert(params);

        assert_eq!(path_param_from_extensions(&extensions, "id"), None);
        assert_eq!(path_param_from_extensions(&extensions, "name"), None);
    }

    #[test]
    fn absent_params_extension_yields_none() {
        let extensions = Extensions::new();
        assert_eq!(path_param_from_extensions(&extensions, "id"), None);
    }
}
