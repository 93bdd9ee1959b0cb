use dotenv::dotenv;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::*;
use teloxide::types::{ChatId, InputFile, ParseMode};
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::sync::Mutex;

mod card;
mod config;
mod controller;
mod db;
mod recipe;

use card::RecipeCard;
use config::Config;
use controller::RecipeList;
use db::{RecipeStore, SqliteStorage};
use recipe::{parse_form, FIELD_NAMES};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type MyDialogue = Dialogue<State, InMemStorage<State>>;
type SharedList = Arc<Mutex<RecipeList<SqliteStorage>>>;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum Command {
    #[command(description = "Display this text.")]
    Help,
    #[command(description = "Show every recipe card.")]
    List,
    #[command(description = "Add a recipe, e.g. /add titleTxt=Soup; rating=4")]
    Add(String),
    #[command(description = "Wipe all stored recipes.")]
    Clear,
    #[command(description = "Get the recipe cards as an HTML page.")]
    Page,
    #[command(description = "List the recipe fields /add understands.")]
    Fields,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum State {
    #[default]
    Start,
    AwaitingForm,
}

/// `/add` without fields waits for the form in the next message; with
/// fields it is complete and drops any pending wait.
fn state_after_add(body: &str) -> State {
    if body.trim().is_empty() {
        State::AwaitingForm
    } else {
        State::Start
    }
}

#[tokio::main]
async fn main() {
    // Load all env variables from .env file.
    dotenv().ok();
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();
    log::info!("Starting bot...");

    let config = Config::from_env();
    log::info!("Opening recipe storage at {}", config.db_path.display());
    let storage = match SqliteStorage::open(&config.db_path) {
        Ok(storage) => storage,
        Err(e) => {
            log::error!("Failed to open storage {}: {}", config.db_path.display(), e);
            return;
        }
    };
    let list = match RecipeList::init(RecipeStore::with_key(storage, config.storage_key)) {
        Ok(list) => list,
        Err(e) => {
            log::error!("Failed to load stored recipes: {}", e);
            return;
        }
    };
    log::info!(
        "Serving {} recipe cards from key {:?}",
        list.cards().len(),
        list.store().key()
    );
    let list: SharedList = Arc::new(Mutex::new(list));

    let bot = Bot::from_env();

    let handler = Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .branch(dptree::case![Command::Help].endpoint(help))
                .branch(dptree::case![Command::List].endpoint(list_recipes))
                .branch(dptree::case![Command::Add(body)].endpoint(add_recipe))
                .branch(dptree::case![Command::Clear].endpoint(clear_recipes))
                .branch(dptree::case![Command::Page].endpoint(send_page))
                .branch(dptree::case![Command::Fields].endpoint(fields)),
        )
        .branch(dptree::case![State::AwaitingForm].endpoint(receive_form));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![list, InMemStorage::<State>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

async fn fields(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, FIELD_NAMES.join("\n")).await?;
    Ok(())
}

async fn send_card(bot: &Bot, chat_id: ChatId, card: &RecipeCard) -> HandlerResult {
    log::debug!(
        "Sending card {:?}",
        card.data().and_then(|r| r.title_txt.as_deref())
    );
    let caption = card.caption();
    if let Some(url) = card.image_url() {
        match bot
            .send_photo(chat_id, InputFile::url(url.clone()))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) => log::warn!("Failed to send photo {}, sending text instead: {}", url, e),
        }
    }
    let text = if caption.is_empty() {
        "<i>Untitled recipe</i>".to_string()
    } else {
        caption
    };
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

async fn list_recipes(bot: Bot, msg: Message, list: SharedList) -> HandlerResult {
    let cards = list.lock().await.cards().to_vec();
    if cards.is_empty() {
        bot.send_message(msg.chat.id, "No recipes yet. Add one with /add")
            .await?;
        return Ok(());
    }
    for card in cards.iter() {
        send_card(&bot, msg.chat.id, card).await?;
    }
    Ok(())
}

async fn add_recipe(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    list: SharedList,
    body: String,
) -> HandlerResult {
    match state_after_add(&body) {
        State::AwaitingForm => {
            dialogue.update(State::AwaitingForm).await?;
            bot.send_message(
                msg.chat.id,
                "Send the recipe as name=value pairs, one per line. /fields lists the names.",
            )
            .await?;
            Ok(())
        }
        State::Start => {
            dialogue.exit().await?;
            submit_form(&bot, msg.chat.id, &list, &body).await
        }
    }
}

async fn receive_form(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    list: SharedList,
) -> HandlerResult {
    match msg.text() {
        Some(body) => {
            submit_form(&bot, msg.chat.id, &list, body).await?;
            dialogue.exit().await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please send the recipe fields as text.")
                .await?;
        }
    }
    Ok(())
}

async fn submit_form(bot: &Bot, chat_id: ChatId, list: &SharedList, body: &str) -> HandlerResult {
    let form = parse_form(body);
    if form.is_empty() {
        bot.send_message(chat_id, "No name=value fields found, nothing was added.")
            .await?;
        return Ok(());
    }
    let submitted = list.lock().await.submit(form).cloned();
    match submitted {
        Ok(card) => {
            bot.send_message(chat_id, "Recipe added:").await?;
            send_card(bot, chat_id, &card).await
        }
        Err(e) => {
            log::error!("Failed to store recipe: {}", e);
            bot.send_message(chat_id, format!("Could not store the recipe: {}", e))
                .await?;
            Ok(())
        }
    }
}

async fn clear_recipes(bot: Bot, msg: Message, list: SharedList) -> HandlerResult {
    let cleared = list.lock().await.clear();
    match cleared {
        Ok(()) => {
            bot.send_message(msg.chat.id, "Cleared all stored recipes.")
                .await?;
        }
        Err(e) => {
            log::error!("Failed to clear storage: {}", e);
            bot.send_message(msg.chat.id, format!("Could not clear storage: {}", e))
                .await?;
        }
    }
    Ok(())
}

async fn send_page(bot: Bot, msg: Message, list: SharedList) -> HandlerResult {
    let html = list.lock().await.render_page();
    bot.send_document(
        msg.chat.id,
        InputFile::memory(html.into_bytes()).file_name("recipes.html"),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_without_fields_waits_for_form() {
        assert_eq!(state_after_add(""), State::AwaitingForm);
        assert_eq!(state_after_add("  \n"), State::AwaitingForm);
    }

    #[test]
    fn test_inline_add_ends_waiting() {
        assert_eq!(state_after_add("titleTxt=Soup"), State::Start);
    }

    #[test]
    fn test_add_command_keeps_body() {
        let command = Command::parse("/add titleTxt=Soup; rating=4", "recipe_bot").unwrap();
        match command {
            Command::Add(body) => assert_eq!(parse_form(&body).len(), 2),
            _ => panic!("expected /add"),
        }
    }
}
