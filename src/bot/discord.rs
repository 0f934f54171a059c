use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::{Event, Intents, Shard, ShardId, StreamExt};
use twilight_http::Client as HttpClient;
use twilight_model::{
    application::{
        command::CommandType,
        interaction::{
            application_command::{CommandData, CommandOptionValue},
            Interaction, InteractionData, InteractionType,
        },
    },
    channel::message::{
        component::{ActionRow, Button, ButtonStyle},
        Component, MessageFlags,
    },
    gateway::payload::incoming::MessageCreate,
    http::{
        attachment::Attachment,
        interaction::{InteractionResponse, InteractionResponseData, InteractionResponseType},
    },
    id::{
        marker::{ApplicationMarker, ChannelMarker},
        Id,
    },
};
use twilight_util::builder::command::{CommandBuilder, StringBuilder};

use crate::cache::UrlCache;
use crate::config::Config;
use crate::media::{
    classify, enabled_platform_names, rewrite_search, Classification, MediaEngine, MediaRequest,
    OutputKind, Platform, Prepared, TargetRef,
};
use crate::stats::Stats;
use crate::utils::{format_number, format_size};

/// Quality grid shown under a recognized link, mirroring the callback ids
/// the download handler parses: `<kind>_<quality>_<cachekey>`.
const AUDIO_QUALITIES: &[&str] = &["128", "192", "256", "320"];
const VIDEO_QUALITIES: &[&str] = &["360", "480", "720", "1080"];

pub struct DiscordBot {
    http: Arc<HttpClient>,
    cache: InMemoryCache,
    shard: Shard,
    engine: Arc<MediaEngine>,
    url_cache: Arc<Mutex<UrlCache>>,
    stats: Arc<Stats>,
    config: Config,
    application_id: Id<ApplicationMarker>,
}

impl DiscordBot {
    pub async fn new(token: String, config: Config) -> Result<Self> {
        let http = Arc::new(HttpClient::new(token.clone()));
        let cache = InMemoryCache::new();

        let intents = Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT;
        let shard = Shard::new(ShardId::ONE, token, intents);

        let stats = Arc::new(Stats::new());
        let engine = Arc::new(MediaEngine::with_ytdlp(
            config.download.scratch_dir.clone(),
            config.download.alt_root_dir.clone(),
            Arc::clone(&stats),
            config.download.max_file_size,
        ));

        crate::media::probe_tools().await;

        let application_id = {
            let response = http.current_user_application().await?;
            response.model().await?.id
        };

        let bot = Self {
            http,
            cache,
            shard,
            engine,
            url_cache: Arc::new(Mutex::new(UrlCache::default())),
            stats,
            config,
            application_id,
        };

        bot.register_commands().await?;

        Ok(bot)
    }

    async fn register_commands(&self) -> Result<()> {
        info!("Registering Discord slash commands...");

        let grab = CommandBuilder::new(
            "grab".to_string(),
            "Fetch media from a link or search query".to_string(),
            CommandType::ChatInput,
        )
        .option(StringBuilder::new("target", "Link or search text").required(true))
        .build();

        let stats = CommandBuilder::new(
            "stats".to_string(),
            "Show bot statistics".to_string(),
            CommandType::ChatInput,
        )
        .build();

        let interaction = self.http.interaction(self.application_id);
        interaction
            .create_global_command()
            .chat_input(&grab.name, &grab.description)
            .command_options(&grab.options)
            .await?;
        interaction
            .create_global_command()
            .chat_input(&stats.name, &stats.description)
            .await?;

        info!("Registered /grab and /stats");
        Ok(())
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Discord bot starting...");

        loop {
            let event = match self
                .shard
                .next_event(twilight_gateway::EventTypeFlags::all())
                .await
            {
                Some(Ok(event)) => event,
                Some(Err(source)) => {
                    error!(?source, "Error receiving event");
                    continue;
                }
                None => {
                    info!("Shard stream ended");
                    return Ok(());
                }
            };

            self.cache.update(&event);

            match event {
                Event::MessageCreate(msg) => {
                    if let Err(e) = self.handle_message(&msg).await {
                        error!("Message handling failed: {e:#}");
                    }
                }
                Event::InteractionCreate(interaction) => {
                    if let Err(e) = self.handle_interaction(&interaction).await {
                        error!("Interaction handling failed: {e:#}");
                    }
                }
                Event::Ready(_) => {
                    info!("Discord bot is ready!");
                }
                _ => {}
            }
        }
    }

    async fn handle_message(&self, msg: &MessageCreate) -> Result<()> {
        if msg.author.bot {
            return Ok(());
        }
        let content = msg.content.trim();
        if content.is_empty() || content.starts_with('/') {
            return Ok(());
        }

        // fast:<link> skips the quality grid and goes straight to 192k MP3.
        if let Some(rest) = content
            .strip_prefix("fast:")
            .or_else(|| content.strip_prefix("quick:"))
        {
            return self
                .fast_download(msg.channel_id, msg.author.id.get(), rest.trim())
                .await;
        }

        match classify(content) {
            Classification::Media { platform, url } => {
                self.offer_formats(msg.channel_id, Some(platform), &url)
                    .await
            }
            Classification::Search(query) if !query.is_empty() => {
                let target = rewrite_search(&query);
                self.offer_formats(msg.channel_id, None, &target).await
            }
            _ => {
                let platforms = enabled_platform_names().join(" • ");
                self.http
                    .create_message(msg.channel_id)
                    .content(&format!(
                        "❌ That link isn't on a supported platform.\nSupported: {platforms}"
                    ))
                    .await?;
                Ok(())
            }
        }
    }

    /// Reply with the MP3/MP4 quality grid. The target string (URL or
    /// rewritten search) goes into the URL cache; buttons carry only the
    /// short key, keeping custom_ids under the payload limit.
    async fn offer_formats(
        &self,
        channel_id: Id<ChannelMarker>,
        platform: Option<Platform>,
        target: &str,
    ) -> Result<()> {
        let key = self
            .url_cache
            .lock()
            .map_err(|_| anyhow::anyhow!("url cache poisoned"))?
            .insert(target);

        let button = |label: String, custom_id: String| {
            Component::Button(Button {
                custom_id: Some(custom_id),
                disabled: false,
                emoji: None,
                label: Some(label),
                style: ButtonStyle::Secondary,
                url: None,
                sku_id: None,
                id: None,
            })
        };

        let mut components = Vec::new();
        for pair in AUDIO_QUALITIES.chunks(2) {
            let row: Vec<Component> = pair
                .iter()
                .map(|q| button(format!("🎵 MP3 {q}kbps"), format!("mp3_{q}_{key}")))
                .collect();
            components.push(Component::ActionRow(ActionRow { components: row, id: None }));
        }
        for pair in VIDEO_QUALITIES.chunks(2) {
            let row: Vec<Component> = pair
                .iter()
                .map(|q| button(format!("📺 MP4 {q}p"), format!("mp4_{q}_{key}")))
                .collect();
            components.push(Component::ActionRow(ActionRow { components: row, id: None }));
        }

        let header = match platform {
            Some(p) => format!("{} Platform detected: **{}**", p.emoji(), p.name()),
            None => "🔎 I'll search for that".to_string(),
        };

        self.http
            .create_message(channel_id)
            .content(&format!("{header}\n📋 Pick a format:"))
            .components(&components)
            .await?;
        Ok(())
    }

    async fn handle_interaction(&self, interaction: &Interaction) -> Result<()> {
        match interaction.kind {
            InteractionType::ApplicationCommand => {
                if let Some(InteractionData::ApplicationCommand(data)) = &interaction.data {
                    match data.name.as_str() {
                        "grab" => self.handle_grab_command(interaction, data).await?,
                        "stats" => self.handle_stats_command(interaction).await?,
                        _ => info!("Unknown command: {}", data.name),
                    }
                }
            }
            InteractionType::MessageComponent => {
                if let Some(InteractionData::MessageComponent(data)) = &interaction.data {
                    self.handle_format_button(interaction, &data.custom_id)
                        .await?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_grab_command(
        &self,
        interaction: &Interaction,
        data: &CommandData,
    ) -> Result<()> {
        let target = data
            .options
            .iter()
            .find(|opt| opt.name == "target")
            .and_then(|opt| match &opt.value {
                CommandOptionValue::String(s) => Some(s.as_str()),
                _ => None,
            })
            .unwrap_or("");

        let channel_id = interaction
            .channel
            .as_ref()
            .map(|c| c.id)
            .context("interaction without channel")?;

        match classify(target) {
            Classification::Media { platform, url } => {
                self.ack_interaction(interaction, "📋 Pick a format below.")
                    .await?;
                self.offer_formats(channel_id, Some(platform), &url).await
            }
            Classification::Search(query) if !query.is_empty() => {
                self.ack_interaction(interaction, "📋 Pick a format below.")
                    .await?;
                let target = rewrite_search(&query);
                self.offer_formats(channel_id, None, &target).await
            }
            _ => {
                let platforms = enabled_platform_names().join(" • ");
                self.ack_interaction(
                    interaction,
                    &format!("❌ Unsupported link.\nSupported: {platforms}"),
                )
                .await
            }
        }
    }

    async fn handle_stats_command(&self, interaction: &Interaction) -> Result<()> {
        let snap = self.stats.snapshot();
        self.ack_interaction(
            interaction,
            &format!(
                "📊 **Bot statistics**\n\
                 📥 Downloads: {}\n\
                 ❌ Errors: {}\n\
                 👥 Users: {}\n\
                 ⏱️ Uptime: {}s",
                format_number(snap.downloads),
                format_number(snap.errors),
                format_number(snap.users),
                format_number(snap.uptime_secs),
            ),
        )
        .await
    }

    /// A quality button was clicked. custom_id: `<kind>_<quality>_<cachekey>`.
    async fn handle_format_button(&self, interaction: &Interaction, custom_id: &str) -> Result<()> {
        let parts: Vec<&str> = custom_id.splitn(3, '_').collect();
        let (Some(&kind), Some(&quality), Some(&key)) =
            (parts.first(), parts.get(1), parts.get(2))
        else {
            return Ok(());
        };
        let Some(kind) = OutputKind::parse(kind) else {
            return Ok(());
        };

        let target = self
            .url_cache
            .lock()
            .map_err(|_| anyhow::anyhow!("url cache poisoned"))?
            .get(key);

        let Some(target) = target else {
            // Cache restarted or entry evicted; the original link is gone.
            self.ack_interaction(
                interaction,
                "❌ I lost track of that link (bot restarted?). Please send it again.",
            )
            .await?;
            return Ok(());
        };

        self.ack_interaction(interaction, "📥 Download starting...")
            .await?;

        let channel_id = interaction
            .channel
            .as_ref()
            .map(|c| c.id)
            .context("interaction without channel")?;
        let session = interaction
            .author_id()
            .map(|id| id.get())
            .unwrap_or_default();

        let target_ref = if target.starts_with("ytsearch") {
            TargetRef::Search(target.clone())
        } else {
            TargetRef::Url(target.clone())
        };
        let request = MediaRequest::new(target, target_ref, kind, quality.to_string(), session);

        self.run_request(channel_id, request).await
    }

    async fn fast_download(
        &self,
        channel_id: Id<ChannelMarker>,
        session: u64,
        input: &str,
    ) -> Result<()> {
        let target_ref = match classify(input) {
            Classification::Media { url, .. } => TargetRef::Url(url),
            Classification::Search(query) if !query.is_empty() => {
                TargetRef::Search(rewrite_search(&query))
            }
            _ => {
                self.http
                    .create_message(channel_id)
                    .content("❌ Unsupported link for fast download.")
                    .await?;
                return Ok(());
            }
        };

        let quality = self.config.default_quality(OutputKind::Audio);
        let request = MediaRequest::new(input, target_ref, OutputKind::Audio, quality, session);
        self.run_request(channel_id, request).await
    }

    /// Run the engine for one request, surfacing coarse progress through a
    /// status message that ends up holding the single terminal reply.
    async fn run_request(&self, channel_id: Id<ChannelMarker>, request: MediaRequest) -> Result<()> {
        let status = self
            .http
            .create_message(channel_id)
            .content("⏳ **Fetching media...**\nThis can take a minute.")
            .await?
            .model()
            .await?;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(usize, usize)>();
        let progress_http = Arc::clone(&self.http);
        let status_id = status.id;
        let progress = tokio::spawn(async move {
            while let Some((i, total)) = rx.recv().await {
                if i == 0 {
                    continue; // the initial status text already covers attempt 1
                }
                let text =
                    format!("⏳ **Fetching media...**\nRetrying, attempt {}/{total}.", i + 1);
                if let Err(e) = progress_http
                    .update_message(channel_id, status_id)
                    .content(Some(&text))
                    .await
                {
                    warn!("status edit failed: {e}");
                }
            }
        });

        let prepared = self
            .engine
            .fetch(&request, move |i, total| {
                let _ = tx.send((i, total));
            })
            .await;
        let _ = progress.await;

        let reply = match prepared {
            Prepared::Ready {
                artifact, caption, ..
            } => match self.deliver(channel_id, &artifact, &caption).await {
                Ok(()) => self.engine.delivered(&request, &artifact),
                Err(e) => {
                    error!("delivery failed: {e:#}");
                    self.engine.delivery_failed(&artifact, &format!("{e:#}"))
                }
            },
            Prepared::Refused(reply) => reply,
        };

        self.http
            .update_message(channel_id, status_id)
            .content(Some(&reply.text))
            .await?;
        Ok(())
    }

    async fn deliver(
        &self,
        channel_id: Id<ChannelMarker>,
        artifact: &crate::media::Artifact,
        caption: &str,
    ) -> Result<()> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let file_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        info!(
            "uploading {} ({})",
            file_name,
            format_size(artifact.size)
        );

        // Attachment ids only need to be unique within the message.
        let mut attachments = vec![Attachment::from_bytes(
            file_name,
            std::fs::read(&artifact.path)?,
            timestamp,
        )];
        if let Some(thumb) = &artifact.thumbnail {
            if let Ok(bytes) = std::fs::read(thumb) {
                attachments.push(Attachment::from_bytes(
                    "thumbnail.jpg".to_string(),
                    bytes,
                    timestamp + 1,
                ));
            }
        }

        self.http
            .create_message(channel_id)
            .content(caption)
            .attachments(&attachments)
            .await?;
        Ok(())
    }

    async fn ack_interaction(&self, interaction: &Interaction, content: &str) -> Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::ChannelMessageWithSource,
            data: Some(InteractionResponseData {
                allowed_mentions: None,
                attachments: None,
                choices: None,
                components: None,
                content: Some(content.to_string()),
                custom_id: None,
                embeds: None,
                flags: Some(MessageFlags::EPHEMERAL),
                title: None,
                tts: None,
                poll: None,
            }),
        };

        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;
        Ok(())
    }
}

pub async fn run(config: Config) -> Result<()> {
    let token = config
        .discord_token()
        .context("DISCORD_TOKEN is required (env or config file)")?;

    let bot = DiscordBot::new(token, config).await?;
    bot.run().await
}
