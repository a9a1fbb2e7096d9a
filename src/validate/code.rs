//! Code-shaped answers: token forms and regex forms.

use tracing::error;

use crate::config::schema::{RegexPattern, Token};

use super::{collapse_whitespace, compact};

/// True if the compacted answer contains every token of some form.
///
/// Tokens are compacted too, so `"a + b"` in YAML means `"a+b"`.
pub(super) fn matches_tokens(forms: &[Vec<Token>], answer: &str) -> bool {
    let haystack = compact(answer);
    forms.iter().any(|form| {
        !form.is_empty()
            && form.iter().all(|token| {
                token
                    .alternatives()
                    .any(|alt| haystack.contains(&compact(alt)))
            })
    })
}

/// True if the collapsed answer matches every regex of some form.
///
/// Scenario validation compiles every regex at load time and rejects bad
/// ones; one that slips through is logged and treated as a non-match.
pub(super) fn matches_patterns(forms: &[Vec<RegexPattern>], answer: &str) -> bool {
    let haystack = collapse_whitespace(&answer.to_lowercase());
    forms.iter().any(|form| {
        !form.is_empty()
            && form.iter().all(|pattern| match pattern.regex() {
                Ok(re) => re.is_match(&haystack),
                Err(e) => {
                    error!(
                        pattern = pattern.as_str(),
                        error = %e,
                        "invalid validator regex (configuration defect)"
                    );
                    false
                }
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Token {
        Token::Literal(s.to_string())
    }

    fn add_forms() -> Vec<Vec<Token>> {
        vec![
            vec![lit("function add(a,b){return a+b")],
            vec![lit("function add(a,b){return b+a")],
            vec![lit("add"), lit("=>"), Token::AnyOf(vec!["a+b".into(), "b+a".into()])],
        ]
    }

    fn range_forms() -> Vec<Vec<RegexPattern>> {
        vec![
            vec![
                r"for ?\( ?((let|var) )?\w+ ?= ?0 ?; ?\w+ ?<= ?1000 ?; ?(\w+\+\+|\+\+\w+|\w+ ?\+= ?1) ?\)".into(),
                r"console\.log ?\( ?\w+ ?\)".into(),
            ],
            vec![
                r"(let|var) \w+ ?= ?0 ?;?".into(),
                r"while ?\( ?\w+ ?<= ?1000 ?\)".into(),
                r"console\.log ?\( ?\w+(\+\+)? ?\)".into(),
            ],
        ]
    }

    #[test]
    fn test_function_add_forms() {
        assert!(matches_tokens(&add_forms(), "function add(a,b){return a+b}"));
        assert!(matches_tokens(
            &add_forms(),
            "function add(a, b) {\n  return a + b;\n}"
        ));
        assert!(matches_tokens(&add_forms(), "const add = (a, b) => a + b;"));
        assert!(!matches_tokens(&add_forms(), "function add(a,b){return a-b}"));
    }

    #[test]
    fn test_empty_form_never_matches() {
        assert!(!matches_tokens(&[vec![]], "anything"));
        assert!(!matches_patterns(&[vec![]], "anything"));
    }

    #[test]
    fn test_for_loop_forms() {
        assert!(matches_patterns(
            &range_forms(),
            "for (let i = 0; i <= 1000; i++) { console.log(i); }"
        ));
        assert!(matches_patterns(
            &range_forms(),
            "for (let n = 0;\n     n <= 1000;\n     n++) {\n  console.log(n);\n}"
        ));
        assert!(!matches_patterns(
            &range_forms(),
            "for (let i = 0; i < 1000; i++) { console.log(i); }"
        ));
    }

    #[test]
    fn test_while_loop_form() {
        assert!(matches_patterns(
            &range_forms(),
            "let i = 0; while (i <= 1000) { console.log(i); i++; }"
        ));
    }

    #[test]
    fn test_invalid_regex_is_non_match() {
        assert!(!matches_patterns(&[vec!["([".into()]], "(["));
    }

    #[test]
    fn test_patterns_are_compiled_once_and_reused() {
        let forms = range_forms();
        assert!(forms.iter().flatten().all(|p| !p.is_compiled()));

        let answer = "for (let i = 0; i <= 1000; i++) { console.log(i); }";
        assert!(matches_patterns(&forms, answer));
        let first: *const regex::Regex = forms[0][0].regex().unwrap();

        assert!(matches_patterns(&forms, answer));
        let second: *const regex::Regex = forms[0][0].regex().unwrap();
        assert!(std::ptr::eq(first, second));
    }
}
