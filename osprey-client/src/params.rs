//! Parameters every REST service accepts.

/// Output and header options shared by all services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonParams {
    /// Indent the JSON response.
    pub pretty: Option<bool>,
    /// Return values in human readable form.
    pub human: Option<bool>,
    /// Include stack traces in error responses.
    pub error_trace: Option<bool>,
    /// Filters reducing the response.
    pub filter_path: Vec<String>,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
}

impl CommonParams {
    /// Append the query parameters that are set.
    pub fn append_to(&self, params: &mut Vec<(String, String)>) {
        if let Some(v) = self.pretty {
            params.push(("pretty".to_string(), v.to_string()));
        }
        if let Some(v) = self.human {
            params.push(("human".to_string(), v.to_string()));
        }
        if let Some(v) = self.error_trace {
            params.push(("error_trace".to_string(), v.to_string()));
        }
        if !self.filter_path.is_empty() {
            params.push(("filter_path".to_string(), self.filter_path.join(",")));
        }
    }
}

/// Setters forwarding to a service's `common` field.
macro_rules! common_params_setters {
    ($ty:ty) => {
        impl $ty {
            /// Indent the JSON response.
            pub fn pretty(mut self, pretty: bool) -> Self {
                self.common.pretty = Some(pretty);
                self
            }

            /// Return values in human readable form.
            pub fn human(mut self, human: bool) -> Self {
                self.common.human = Some(human);
                self
            }

            /// Include stack traces in error responses.
            pub fn error_trace(mut self, error_trace: bool) -> Self {
                self.common.error_trace = Some(error_trace);
                self
            }

            /// Filters reducing the response.
            ///
            /// On a bulk request, filtering `items` (e.g. `items.*.error`)
            /// drops entries, so the remaining items no longer line up with
            /// the submitted actions by position.
            pub fn filter_path<I, S>(mut self, filters: I) -> Self
            where
                I: IntoIterator<Item = S>,
                S: Into<String>,
            {
                self.common.filter_path = filters.into_iter().map(Into::into).collect();
                self
            }

            /// Add a request header.
            pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
                self.common.headers.push((name.into(), value.into()));
                self
            }
        }
    };
}

pub(crate) use common_params_setters;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_params_are_skipped() {
        let mut params = Vec::new();
        CommonParams::default().append_to(&mut params);
        assert!(params.is_empty());
    }

    #[test]
    fn test_append_to() {
        let common = CommonParams {
            pretty: Some(true),
            error_trace: Some(false),
            filter_path: vec!["took".to_string(), "items.*.error".to_string()],
            ..Default::default()
        };
        let mut params = Vec::new();
        common.append_to(&mut params);
        assert_eq!(
            params,
            vec![
                ("pretty".to_string(), "true".to_string()),
                ("error_trace".to_string(), "false".to_string()),
                ("filter_path".to_string(), "took,items.*.error".to_string()),
            ]
        );
    }
}
