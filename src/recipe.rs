use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Form field names, in the order the card lays them out.
pub const FIELD_NAMES: [&str; 9] = [
    "imgSrc",
    "imgAlt",
    "titleLnk",
    "titleTxt",
    "organization",
    "rating",
    "numRatings",
    "lengthTime",
    "ingredients",
];

/// One dish. Every field may be missing; missing fields render as empty output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub img_src: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub img_alt: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub title_lnk: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub title_txt: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, deserialize_with = "lenient_rating", skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub num_ratings: Option<u64>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub length_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    /// Keys the card does not show, kept so rewrites of the collection preserve them.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Recipe {
    /// Builds a recipe out of submitted form pairs.
    ///
    /// Only the submitted fields end up set. `rating` and `numRatings` are
    /// parsed here; a value that does not parse leaves the field empty.
    /// Other names are kept as text in `extra`.
    pub fn from_form<I, K, V>(pairs: I) -> Recipe
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut recipe = Recipe::default();
        for (name, value) in pairs {
            let value = value.as_ref().to_string();
            match name.as_ref() {
                "imgSrc" => recipe.img_src = Some(value),
                "imgAlt" => recipe.img_alt = Some(value),
                "titleLnk" => recipe.title_lnk = Some(value),
                "titleTxt" => recipe.title_txt = Some(value),
                "organization" => recipe.organization = Some(value),
                "rating" => recipe.rating = parse_rating(&value),
                "numRatings" => recipe.num_ratings = parse_count(&value),
                "lengthTime" => recipe.length_time = Some(value),
                "ingredients" => recipe.ingredients = Some(value),
                other => {
                    log::warn!("Keeping unknown form field {:?}", other);
                    recipe.extra.insert(other.to_string(), Value::String(value));
                }
            }
        }
        recipe
    }
}

/// Splits a form body like `titleTxt=Soup; rating=4` into name/value pairs.
///
/// Pairs are separated by `;` or newlines. Only the first `=` splits, so
/// links keep their query strings. Chunks without `=` are dropped.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split(|c: char| c == ';' || c == '\n')
        .filter_map(|chunk| {
            let (name, value) = chunk.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn parse_rating(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|r| r.is_finite())
}

/// Whole, non-negative counts that fit in a `u64`; anything else is absent.
fn whole_count(n: f64) -> Option<u64> {
    if n >= 0.0 && n.fract() == 0.0 && n < u64::MAX as f64 {
        Some(n as u64)
    } else {
        None
    }
}

fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    text.parse::<u64>()
        .ok()
        .or_else(|| parse_rating(text).and_then(whole_count))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_rating(&s),
        _ => None,
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(whole_count)),
        Value::String(s) => parse_count(&s),
        _ => None,
    })
}
