#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use phrasecut::app_config::{self, Config, TranslationProvider};
use phrasecut::app_controller::{Controller, SubtitleInput};
use phrasecut::course::LessonImport;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    Anthropic,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug, Clone)]
struct GlobalArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,

    /// Translation provider to use
    #[arg(short, long, value_enum, global = true)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long, global = true)]
    model: Option<String>,
}

/// Options of the segmentation subcommands
#[derive(clap::Args, Debug, Clone)]
struct SegmentArgs {
    /// Directory receiving segment_NNN files and audio-info.json
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Language of the subtitles (ISO code or 'auto')
    #[arg(short, long)]
    source_language: Option<String>,

    /// Translate the subtitles into this language before segmenting
    #[arg(short, long)]
    target_language: Option<String>,

    /// Seconds of trailing margin added to every clip
    #[arg(short, long)]
    buffer: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the audio of a video and cut it into one clip per subtitle
    SplitVideo {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Subtitle file (SRT, WebVTT or normalized JSON)
        #[arg(short = 'S', long, required_unless_present = "subtitle_track")]
        subtitles: Option<PathBuf>,

        /// Use this subtitle stream of the video instead of a file
        #[arg(long, conflicts_with = "subtitles")]
        subtitle_track: Option<usize>,

        #[command(flatten)]
        segment: SegmentArgs,
    },

    /// Cut an audio file into one clip per subtitle
    SplitAudio {
        /// Input audio file
        #[arg(short, long)]
        audio: PathBuf,

        /// Subtitle file (SRT, WebVTT or normalized JSON)
        #[arg(short = 'S', long)]
        subtitles: PathBuf,

        #[command(flatten)]
        segment: SegmentArgs,
    },

    /// Convert a subtitle file to the normalized JSON form
    Normalize {
        /// Subtitle file to normalize
        #[arg(value_name = "SUBTITLES")]
        subtitles: PathBuf,

        /// Output file (defaults to <stem>.json next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create an empty course
    CreateCourse {
        /// Course name
        #[arg(short, long)]
        name: String,

        /// Course directory
        #[arg(long)]
        path: PathBuf,

        /// Language being learned (spoken in the lesson audio)
        #[arg(short, long)]
        target_language: String,
    },

    /// Segment a video into the next lesson of a course
    ImportLesson {
        /// Course directory
        #[arg(long)]
        course_path: PathBuf,

        /// Lesson name
        #[arg(short, long)]
        name: String,

        /// Where the lesson material came from
        #[arg(long, default_value = "")]
        source_link: String,

        /// Input video (or audio with --audio-only)
        #[arg(short, long)]
        video: PathBuf,

        /// Subtitle file in the course language
        #[arg(short = 'S', long)]
        subtitles: PathBuf,

        /// Translate phrases into this language
        #[arg(long)]
        native_language: Option<String>,

        /// The input is already audio
        #[arg(long)]
        audio_only: bool,

        /// Overwrite an existing lesson index
        #[arg(long)]
        index: Option<usize>,
    },

    /// Export (target, source, audio) triples of every lesson
    ExportPhrases {
        /// Course directory
        #[arg(long)]
        course_path: PathBuf,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions for phrasecut
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// phrasecut - subtitle-synchronized audio segmentation
///
/// Cuts the audio of a video into one clip per subtitle line and organizes
/// the clips into language-learning courses.
#[derive(Parser, Debug)]
#[command(name = "phrasecut")]
#[command(version)]
#[command(about = "Subtitle-synchronized audio segmentation")]
#[command(long_about = "phrasecut cuts media into one audio clip per subtitle line.

EXAMPLES:
    phrasecut split-video -v clip.mp4 -S clip.srt -o out/          # segment_001.mp3 ...
    phrasecut split-video -v clip.mkv --subtitle-track 2 -o out/   # use an embedded track
    phrasecut split-audio -a clip.mp3 -S clip.json -o out/ -t en   # translate to English first
    phrasecut normalize clip.vtt                                   # writes clip.json
    phrasecut create-course -n Spanish --path course/ -t es
    phrasecut import-lesson --course-path course/ -n Intro -v clip.mp4 -S clip.srt --native-language en
    phrasecut export-phrases --course-path course/ -o phrases.json
    phrasecut completions bash > phrasecut.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file does not
    exist, a default one is created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        // The logger accepts everything; log::max_level does the filtering
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "phrasecut", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = &cli.global.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = load_config(&cli.global)?;

    match cli.command {
        Commands::SplitVideo {
            video,
            subtitles,
            subtitle_track,
            segment,
        } => {
            apply_segment_args(&mut config, &segment);
            let controller = build_controller(config)?;

            let input = match (subtitles, subtitle_track) {
                (Some(path), _) => SubtitleInput::File(path),
                (None, Some(track)) => SubtitleInput::Track(track),
                (None, None) => return Err(anyhow::anyhow!("Either --subtitles or --subtitle-track is required")),
            };
            controller.split_video(&video, input, &segment.output_dir).await?;
        }
        Commands::SplitAudio {
            audio,
            subtitles,
            segment,
        } => {
            apply_segment_args(&mut config, &segment);
            let controller = build_controller(config)?;
            controller.split_audio(&audio, &subtitles, &segment.output_dir).await?;
        }
        Commands::Normalize { subtitles, output } => {
            let controller = build_controller(config)?;
            controller.normalize(&subtitles, output)?;
        }
        Commands::CreateCourse {
            name,
            path,
            target_language,
        } => {
            let controller = build_controller(config)?;
            let course = controller.create_course(&name, &path, &target_language)?;
            info!(
                "Course '{}' ready (model id {}, deck id {})",
                course.name, course.anki.model_id, course.anki.deck_id
            );
        }
        Commands::ImportLesson {
            course_path,
            name,
            source_link,
            video,
            subtitles,
            native_language,
            audio_only,
            index,
        } => {
            config.target_language = native_language.clone();
            let controller = build_controller(config)?;
            controller
                .import_lesson(
                    &course_path,
                    LessonImport {
                        name,
                        source_link,
                        video_path: video,
                        subtitle_path: subtitles,
                        native_language,
                        skip_extraction: audio_only,
                        index,
                    },
                )
                .await?;
        }
        Commands::ExportPhrases { course_path, output } => {
            let controller = build_controller(config)?;
            let triples = controller.export_phrases(&course_path, output.as_deref())?;
            if output.is_none() {
                let json = serde_json::to_string_pretty(&triples).context("Failed to serialize phrases")?;
                println!("{}", json);
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load the config file, creating it with defaults when missing, and apply
/// the global CLI overrides
fn load_config(options: &GlobalArgs) -> Result<Config> {
    let config_path = &options.config_path;

    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).with_context(|| format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).with_context(|| format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);
        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", config_path))?;
        config
    };

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }

    if let Some(model) = &options.model {
        let provider_str = config.translation.provider.to_lowercase_string();
        if let Some(provider_config) = config
            .translation
            .available_providers
            .iter_mut()
            .find(|p| p.provider_type == provider_str)
        {
            provider_config.model = model.clone();
        }
    }

    match &options.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    Ok(config)
}

fn apply_segment_args(config: &mut Config, args: &SegmentArgs) {
    if let Some(source) = &args.source_language {
        config.source_language = source.clone();
    }
    if let Some(target) = &args.target_language {
        config.target_language = Some(target.clone());
    }
    if let Some(buffer) = args.buffer {
        config.segmentation.buffer_time_seconds = buffer;
    }
}

fn build_controller(config: Config) -> Result<Controller> {
    config.validate().context("Configuration validation failed")?;
    Controller::with_config(config)
}
