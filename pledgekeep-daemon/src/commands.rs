//! Slash command parsing and response rendering.
//!
//! Interaction payloads are mapped onto a closed command enum before any
//! handling happens, so the server only ever dispatches commands it knows.
//! Rendering turns a lookup result into the embeds Discord displays.

use chrono::{DateTime, Utc};
use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateEmbed, CreateEmbedAuthor, CreateInteractionResponse,
    CreateInteractionResponseMessage,
};
use serenity::model::application::{CommandData, CommandOptionType};
use serenity::model::user::User;
use serenity::model::{Colour, Timestamp};
use std::collections::HashMap;

use pledgekeep_core::Patron;

/// Embed colour of a failed lookup.
const NOT_FOUND_COLOUR: Colour = Colour(0xeb4034);

/// Embed colour of a successful lookup.
const FOUND_COLOUR: Colour = Colour(0x4287f5);

/// What a lookup searches by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupTarget {
    Email(String),
    User(u64),
}

/// The commands this application handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    /// Look up a patron by email or linked Discord account.
    Lookup(LookupTarget),
}

/// Why an interaction payload did not map to a [`SlashCommand`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command {name}")]
    UnknownCommand { name: String },

    #[error("lookup target missing")]
    MissingTarget,
}

impl SlashCommand {
    /// Map a command payload onto a supported command.
    ///
    /// A `lookup` carrying both options searches by email.
    pub fn parse(data: &CommandData) -> Result<Self, ParseError> {
        match data.name.as_str() {
            "lookup" => {
                let email = data
                    .options
                    .iter()
                    .find(|option| option.name == "email")
                    .and_then(|option| option.value.as_str());
                if let Some(email) = email {
                    return Ok(Self::Lookup(LookupTarget::Email(email.to_string())));
                }

                let user = data
                    .options
                    .iter()
                    .find(|option| option.name == "user")
                    .and_then(|option| option.value.as_user_id());
                match user {
                    Some(user) => Ok(Self::Lookup(LookupTarget::User(user.get()))),
                    None => Err(ParseError::MissingTarget),
                }
            }
            _ => Err(ParseError::UnknownCommand {
                name: data.name.clone(),
            }),
        }
    }
}

/// The global command set to register with Discord.
pub fn create_commands() -> Vec<CreateCommand> {
    vec![CreateCommand::new("lookup")
        .description("Look up information about a user's subscription")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "email",
                "The Patreon email address of the user to lookup",
            )
            .required(false),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::User,
                "user",
                "The Discord Id of the user to lookup",
            )
            .required(false),
        )]
}

/// A plain-text response only the invoking user sees.
pub fn ephemeral_text(content: impl Into<String>) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// The embed shown when no patron matches the target.
pub fn not_found_response(target: &LookupTarget) -> CreateInteractionResponse {
    let description = match target {
        LookupTarget::Email(email) => format!("No Patreon account with email `{}` found", email),
        LookupTarget::User(id) => format!("No Patreon account with id `{}` found", id),
    };

    let embed = CreateEmbed::new()
        .title("Account Not Found")
        .description(description)
        .colour(NOT_FOUND_COLOUR)
        .timestamp(Timestamp::now());

    CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed))
}

/// The embed shown for a matched patron.
pub fn found_response(
    patron: &Patron,
    tier_names: &HashMap<u64, String>,
    invoker: &User,
) -> CreateInteractionResponse {
    let embed = CreateEmbed::new()
        .title("Account Found")
        .url(format!("https://www.patreon.com/user?u={}", patron.id))
        .colour(FOUND_COLOUR)
        .timestamp(Timestamp::now())
        .author(CreateEmbedAuthor::new(&invoker.name).icon_url(invoker.face()))
        .field(
            "Status",
            text_or_unknown(patron.attributes.patron_status.as_deref()),
            true,
        )
        .field(
            "Last Charge Status",
            text_or_unknown(patron.attributes.last_charge_status.as_deref()),
            true,
        )
        .field(
            "Last Charge Date",
            date_or_unknown(patron.attributes.last_charge_date),
            true,
        )
        .field(
            "Join Date",
            date_or_unknown(patron.attributes.pledge_start),
            true,
        )
        .field("Active Tiers", render_tiers(&patron.tiers, tier_names), true)
        .field("Discord Account", render_discord(patron.discord_id), true);

    CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed))
}

fn text_or_unknown(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "Unknown".to_string(),
    }
}

/// Render a date as a Discord timestamp the client localizes.
fn date_or_unknown(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => format!("<t:{}>", date.timestamp()),
        None => "Unknown".to_string(),
    }
}

/// Tier display names joined with commas. Ids missing from the mapping keep
/// a placeholder so the entitlement stays visible.
fn render_tiers(tiers: &[u64], tier_names: &HashMap<u64, String>) -> String {
    if tiers.is_empty() {
        return "None".to_string();
    }

    tiers
        .iter()
        .map(|id| match tier_names.get(id) {
            Some(name) => name.clone(),
            None => format!("Unknown (ID: {})", id),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_discord(discord_id: Option<u64>) -> String {
    match discord_id {
        Some(id) => format!("<@{}> ({})", id, id),
        None => "Not linked".to_string(),
    }
}
