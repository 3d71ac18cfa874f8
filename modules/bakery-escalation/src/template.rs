use std::collections::HashMap;

use anyhow::{bail, Result};

/// Replace `{{var}}` placeholders from `vars`. Unknown names are left in place.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '{' && chars.peek() == Some(&'{') {
            chars.next(); // consume second {

            let mut var_name = String::new();
            loop {
                match chars.next() {
                    Some('}') if chars.peek() == Some(&'}') => {
                        chars.next();
                        break;
                    }
                    Some(ch) => var_name.push(ch),
                    None => {
                        // Malformed, emit what we have
                        result.push_str("{{");
                        result.push_str(&var_name);
                        return result;
                    }
                }
            }

            let var_name = var_name.trim();
            match vars.get(var_name) {
                Some(value) => result.push_str(value),
                None => {
                    result.push_str("{{");
                    result.push_str(var_name);
                    result.push_str("}}");
                }
            }
        } else {
            result.push(c);
        }
    }

    result
}

/// Check that every `{{...}}` in `template` names one of `allowed`.
pub fn validate(template: &str, allowed: &[&str]) -> Result<()> {
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '{' || chars.peek() != Some(&'{') {
            continue;
        }
        chars.next();

        let mut var_name = String::new();
        loop {
            match chars.next() {
                Some('}') if chars.peek() == Some(&'}') => {
                    chars.next();
                    break;
                }
                Some(ch) => var_name.push(ch),
                None => bail!("Unclosed template variable in: {template}"),
            }
        }

        let var_name = var_name.trim();
        if !allowed.contains(&var_name) {
            bail!(
                "Unknown template variable {{{{{var_name}}}}}; expected one of: {}",
                allowed.join(", ")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("order_number", "B12".to_string()),
            ("bucket", "2026-03-04".to_string()),
        ])
    }

    #[test]
    fn render_substitutes_known_vars() {
        assert_eq!(
            render("Order {{order_number}} due {{ bucket }}", &vars()),
            "Order B12 due 2026-03-04"
        );
    }

    #[test]
    fn render_leaves_unknown_vars() {
        assert_eq!(render("Hi {{customer}}", &vars()), "Hi {{customer}}");
    }

    #[test]
    fn render_handles_unclosed_var() {
        assert_eq!(render("Hi {{order_number", &vars()), "Hi {{order_number");
    }

    #[test]
    fn validate_rejects_unknown_and_unclosed() {
        let allowed = ["order_number", "bucket"];
        assert!(validate("{{order_number}}:{{bucket}}", &allowed).is_ok());
        assert!(validate("{{order_id}}", &allowed).is_err());
        assert!(validate("{{order_number", &allowed).is_err());
        assert!(validate("no placeholders {}", &allowed).is_ok());
    }
}
