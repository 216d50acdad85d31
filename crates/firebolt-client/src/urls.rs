//! Service URL templates.

/// System-engine discovery for an account (V2).
pub const ENGINE_URL_BY_ACCOUNT_NAME: &str = "/web/v3/account/{account_name}/engineUrl";

/// Account id resolution by name (V2).
pub const ACCOUNT_ID_BY_NAME: &str = "/web/v3/account/{account_name}/resolve";

/// Fill the `{account_name}` slot of a template.
pub fn format_account_url(template: &str, account_name: &str) -> String {
    template.replace("{account_name}", account_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_account_url() {
        assert_eq!(
            format_account_url(ENGINE_URL_BY_ACCOUNT_NAME, "dev"),
            "/web/v3/account/dev/engineUrl"
        );
    }
}
