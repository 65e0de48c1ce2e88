//! Public slug generation.

use rand::distributions::Alphanumeric;
use rand::Rng;

const MAX_BASE_LENGTH: usize = 50;
const SUFFIX_LENGTH: usize = 6;

/// Slug derived from a title plus a random suffix, e.g. `reunion-d-equipe-x7k2qa`.
pub fn generate_slug(title: &str) -> String {
    let mut base = String::with_capacity(title.len());
    let mut pending_dash = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        let folded = if c.is_ascii_alphanumeric() {
            Some(c.to_string())
        } else {
            fold_accent(c).map(str::to_string)
        };
        match folded {
            Some(folded) => {
                if pending_dash && !base.is_empty() {
                    base.push('-');
                }
                pending_dash = false;
                base.push_str(&folded);
            }
            None => pending_dash = true,
        }
        if base.len() >= MAX_BASE_LENGTH {
            break;
        }
    }

    base.truncate(MAX_BASE_LENGTH);
    let base = base.trim_end_matches('-');
    let base = if base.is_empty() { "sondage" } else { base };

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LENGTH)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{base}-{suffix}")
}

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' => "a",
        'ç' => "c",
        'é' | 'è' | 'ê' | 'ë' => "e",
        'î' | 'ï' | 'í' => "i",
        'ô' | 'ö' | 'ó' => "o",
        'ù' | 'û' | 'ü' | 'ú' => "u",
        'ÿ' => "y",
        'ñ' => "n",
        'œ' => "oe",
        'æ' => "ae",
        _ => return None,
    };
    Some(folded)
}
