use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use url::Url;

use crate::recipe::Recipe;

pub const STAR_ICON_DIR: &str = "assets/images/icons";

pub const CARD_STYLE: &str = "
  * { font-family: sans-serif; margin: 0; padding: 0; }
  a { text-decoration: none; }
  a:hover { text-decoration: underline; }
  main { display: flex; flex-wrap: wrap; gap: 16px; padding: 16px; }
  article {
    align-items: center;
    border: 1px solid rgb(223, 225, 229);
    border-radius: 8px;
    display: grid;
    grid-template-rows: 118px 56px 14px 18px 15px 36px;
    row-gap: 5px;
    padding: 0 16px 16px 16px;
    width: 178px;
  }
  div.rating { align-items: center; column-gap: 5px; display: flex; }
  div.rating > img { display: inline-block; object-fit: scale-down; width: 78px; }
  article > img {
    border-top-left-radius: 8px;
    border-top-right-radius: 8px;
    height: 118px;
    object-fit: cover;
    margin-left: -16px;
    width: calc(100% + 32px);
  }
  p.ingredients { height: 32px; line-height: 16px; padding-top: 4px; overflow: hidden; }
  p.title { font-size: 16px; height: 36px; line-height: 18px; overflow: hidden; }
  p:not(.title), span, time { color: #70757A; font-size: 12px; }
";

/// A card showing one recipe. Starts blank until data is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeCard {
    data: Option<Recipe>,
}

impl From<Recipe> for RecipeCard {
    fn from(recipe: Recipe) -> Self {
        RecipeCard { data: Some(recipe) }
    }
}

fn field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn number<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl RecipeCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, recipe: Recipe) {
        self.data = Some(recipe);
    }

    pub fn data(&self) -> Option<&Recipe> {
        self.data.as_ref()
    }

    /// Renders the card as an HTML `<article>`. Missing fields come out empty.
    pub fn article(&self) -> String {
        let Some(recipe) = &self.data else {
            return "<article></article>".to_string();
        };
        let rating = number(recipe.rating);
        let star_src = if rating.is_empty() {
            String::new()
        } else {
            format!("{}/{}-star.svg", STAR_ICON_DIR, rating)
        };
        format!(
            r#"<article>
  <img src="{img_src}" alt="{img_alt}">
  <p class="title">
    <a href="{title_lnk}">{title_txt}</a>
  </p>
  <p class="organization">{organization}</p>
  <div class="rating">
    <span>{rating}</span>
    <img src="{star_src}" alt="{rating_attr} stars">
    <span>({num_ratings})</span>
  </div>
  <time>{length_time}</time>
  <p class="ingredients">{ingredients}</p>
</article>"#,
            img_src = attr(field(&recipe.img_src)),
            img_alt = attr(field(&recipe.img_alt)),
            title_lnk = attr(field(&recipe.title_lnk)),
            title_txt = text(field(&recipe.title_txt)),
            organization = text(field(&recipe.organization)),
            rating = text(&rating),
            star_src = attr(&star_src),
            rating_attr = attr(&rating),
            num_ratings = number(recipe.num_ratings),
            length_time = text(field(&recipe.length_time)),
            ingredients = text(field(&recipe.ingredients)),
        )
    }

    /// Telegram HTML caption. Lines with nothing to show are left out.
    pub fn caption(&self) -> String {
        let Some(recipe) = &self.data else {
            return String::new();
        };
        let mut lines = Vec::new();

        let title = text(field(&recipe.title_txt));
        match recipe.title_lnk.as_deref().filter(|l| !l.is_empty()) {
            Some(link) => lines.push(format!("<b><a href=\"{}\">{}</a></b>", attr(link), title)),
            None if !title.is_empty() => lines.push(format!("<b>{}</b>", title)),
            None => (),
        }
        if let Some(org) = recipe.organization.as_deref().filter(|o| !o.is_empty()) {
            lines.push(text(org).to_string());
        }
        match (recipe.rating, recipe.num_ratings) {
            (Some(rating), Some(count)) => lines.push(format!("★ {} ({})", rating, count)),
            (Some(rating), None) => lines.push(format!("★ {}", rating)),
            (None, Some(count)) => lines.push(format!("({})", count)),
            (None, None) => (),
        }
        if let Some(time) = recipe.length_time.as_deref().filter(|t| !t.is_empty()) {
            lines.push(format!("<i>{}</i>", text(time)));
        }
        if let Some(ingredients) = recipe.ingredients.as_deref().filter(|i| !i.is_empty()) {
            lines.push(text(ingredients).to_string());
        }
        lines.join("\n")
    }

    /// The image source, when it points at something the chat can fetch.
    pub fn image_url(&self) -> Option<Url> {
        let src = self.data.as_ref()?.img_src.as_deref()?;
        Url::parse(src)
            .ok()
            .filter(|url| url.scheme() == "http" || url.scheme() == "https")
    }
}

/// A full HTML document with one article per card, in order.
pub fn render_page(cards: &[RecipeCard]) -> String {
    let articles = cards
        .iter()
        .map(|card| card.article())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Recipes</title>
<style>{}</style>
</head>
<body>
<main>
{}
</main>
</body>
</html>
"#,
        CARD_STYLE, articles
    )
}
