//! Token layout derivations.

use std::collections::BTreeMap;

use crate::model::{Bound, PageNumber, PageSize, PageToken, TokenPage};

/// Ratio between the displayed page width and the token source's native width.
///
/// `1.0` when either width is unknown.
pub fn token_scale(display: Option<PageSize>, token_pages: &[TokenPage]) -> f32 {
    let native = token_pages.first().map(|page| page.size.width);
    match (display, native) {
        (Some(display), Some(native)) if display.width > 0.0 && native > 0.0 => {
            display.width / native
        }
        _ => 1.0,
    }
}

/// Tokens of every page in display coordinates.
pub fn tokens_by_pages(
    token_pages: &[TokenPage],
    scale: f32,
) -> BTreeMap<PageNumber, Vec<PageToken>> {
    token_pages
        .iter()
        .map(|page| {
            let tokens = page
                .objs
                .iter()
                .map(|token| PageToken {
                    text: token.text.clone(),
                    bound: Bound::from_bbox(token.bbox).scaled(scale),
                })
                .collect();
            (page.page_num, tokens)
        })
        .collect()
}

/// Native size of each token page.
pub fn native_sizes(token_pages: &[TokenPage]) -> BTreeMap<PageNumber, PageSize> {
    token_pages
        .iter()
        .map(|page| (page.page_num, page.size))
        .collect()
}

/// Text of the tokens lying fully inside `bound`, in token order.
pub fn text_inside(bound: &Bound, tokens: &[PageToken]) -> String {
    tokens
        .iter()
        .filter(|token| bound.contains(&token.bound))
        .map(|token| token.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Token;

    fn token_page(width: f32) -> TokenPage {
        TokenPage {
            page_num: 1,
            size: PageSize::new(width, width * 1.5),
            objs: vec![Token {
                text: "a".to_string(),
                bbox: [10.0, 10.0, 20.0, 20.0],
            }],
        }
    }

    #[test]
    fn test_token_scale() {
        let pages = [token_page(500.0)];
        assert_eq!(token_scale(Some(PageSize::new(1000.0, 1500.0)), &pages), 2.0);
        assert_eq!(token_scale(None, &pages), 1.0);
        assert_eq!(token_scale(Some(PageSize::new(1000.0, 1500.0)), &[]), 1.0);
        assert_eq!(token_scale(Some(PageSize::new(1000.0, 1500.0)), &[token_page(0.0)]), 1.0);
    }

    #[test]
    fn test_tokens_scaled_to_display() {
        let tokens = tokens_by_pages(&[token_page(500.0)], 2.0);
        assert_eq!(tokens[&1][0].bound, Bound::new(20.0, 20.0, 20.0, 20.0));
    }

    #[test]
    fn test_text_inside_requires_full_containment() {
        let tokens = vec![
            PageToken {
                text: "in".to_string(),
                bound: Bound::new(1.0, 1.0, 5.0, 5.0),
            },
            PageToken {
                text: "partial".to_string(),
                bound: Bound::new(8.0, 1.0, 5.0, 5.0),
            },
        ];
        assert_eq!(text_inside(&Bound::new(0.0, 0.0, 10.0, 10.0), &tokens), "in");
        assert_eq!(text_inside(&Bound::new(50.0, 50.0, 1.0, 1.0), &tokens), "");
    }
}
