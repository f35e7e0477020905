use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::HashSet;
use std::io::{self, Write};
use tracing::{info, warn};

use seriesrip::episodemap::{automap, format_duration};
use seriesrip::{
    Candidate, Config, Disc, DiscScanner, Episode, EpisodeMap, FirstSolutionResolver, Library,
    MapTarget, Program, RipRecord, Ripper, Season, SolutionResolver, Title,
};

fn cli() -> Command {
    Command::new("seriesrip")
        .version("0.1.0")
        .about("TV series disc ripping and duration-based episode mapping")
        .subcommand_required(true)
        .arg(
            Arg::new("source")
                .short('i')
                .long("source")
                .value_name("DEVICE")
                .help("Source device or path to scan")
                .global(true)
        )
        .arg(
            Arg::new("duration-min")
                .long("duration-min")
                .value_name("MINUTES")
                .help("Minimum expected episode duration")
                .global(true)
        )
        .arg(
            Arg::new("duration-max")
                .long("duration-max")
                .value_name("MINUTES")
                .help("Maximum expected episode duration")
                .global(true)
        )
        .arg(
            Arg::new("program")
                .short('p')
                .long("program")
                .value_name("NAME")
                .help("Program to rip episodes for")
                .global(true)
        )
        .arg(
            Arg::new("season")
                .short('s')
                .long("season")
                .value_name("NUM")
                .help("Season to rip episodes for")
                .global(true)
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true)
        )
        .subcommand(Command::new("scan").about("Scan the source and print its layout"))
        .subcommand(
            Command::new("map")
                .about("Map the source onto unripped episodes and print the result")
                .arg(first_flag())
        )
        .subcommand(
            Command::new("rip")
                .about("Map the source onto unripped episodes and rip them")
                .arg(first_flag())
        )
        .subcommand(
            Command::new("episodes")
                .about("List a season's episodes and their ripped status")
        )
        .subcommand(
            Command::new("define")
                .about("Define a season's episodes by name, numbered in order")
                .arg(
                    Arg::new("names")
                        .value_name("NAME")
                        .help("Episode names, assigned numbers 1..N in order")
                        .num_args(1..)
                        .required(true)
                )
        )
}

fn first_flag() -> Arg {
    Arg::new("first")
        .long("first")
        .help("Pick the first candidate when the chapter mapping is ambiguous")
        .action(ArgAction::SetTrue)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let filter = if matches.get_flag("verbose") {
        "seriesrip=debug,info"
    } else {
        "seriesrip=info,warn"
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    apply_overrides(&mut config, &matches)?;
    config.validate()?;

    match matches.subcommand() {
        Some(("scan", _)) => run_scan(&config).await,
        Some(("map", sub)) => run_map(&config, sub).await,
        Some(("rip", sub)) => run_rip(&config, sub).await,
        Some(("episodes", _)) => run_episodes(&config).await,
        Some(("define", sub)) => run_define(&config, sub).await,
        _ => unreachable!("subcommand is required"),
    }
}

fn apply_overrides(config: &mut Config, matches: &ArgMatches) -> Result<()> {
    if let Some(source) = matches.get_one::<String>("source") {
        config.rip.source = source.clone();
    }
    if let Some(min) = matches.get_one::<String>("duration-min") {
        config.rip.duration_min = min.parse()?;
    }
    if let Some(max) = matches.get_one::<String>("duration-max") {
        config.rip.duration_max = max.parse()?;
    }
    if let Some(program) = matches.get_one::<String>("program") {
        config.rip.program = Some(program.clone());
    }
    if let Some(season) = matches.get_one::<String>("season") {
        config.rip.season = Some(season.parse()?);
    }
    Ok(())
}

/// The program and season the command applies to
fn selected_program(config: &Config) -> Result<(String, u32)> {
    let program = config
        .rip
        .program
        .clone()
        .ok_or_else(|| anyhow!("no program selected; pass --program or set rip.program"))?;
    let season = config
        .rip
        .season
        .ok_or_else(|| anyhow!("no season selected; pass --season or set rip.season"))?;
    Ok((program, season))
}

async fn run_scan(config: &Config) -> Result<()> {
    let scanner = DiscScanner::new(&config.paths.handbrake);
    let disc = scanner.scan(&config.rip.source).await?;

    println!("Disc: {} (fingerprint {})", disc.source, disc.fingerprint);
    for title in &disc.titles {
        println!(
            "Title {}: {} ({}x{}, {:.1} fps{})",
            title.number,
            format_duration(title.duration),
            title.size.0,
            title.size.1,
            title.frame_rate,
            if title.interlaced { ", interlaced" } else { "" },
        );
        for chapter in &title.chapters {
            println!(
                "  Chapter {}: {}",
                chapter.number,
                format_duration(chapter.duration)
            );
        }
        for track in &title.audio_tracks {
            println!(
                "  Audio {}: {} [{}] {} {}{}",
                track.number,
                track.name,
                track.language,
                track.encoding,
                track.channel_mix,
                if track.best { " *" } else { "" },
            );
        }
        for track in &title.subtitle_tracks {
            println!(
                "  Subtitle {}: {} [{}]{}",
                track.number,
                track.name,
                track.language,
                if track.best { " *" } else { "" },
            );
        }
    }
    Ok(())
}

async fn run_map(config: &Config, matches: &ArgMatches) -> Result<()> {
    let (disc, _, _, episodes, map) = compute_mapping(config, matches).await?;
    print_mapping(&disc, &episodes, &map);
    Ok(())
}

async fn run_rip(config: &Config, matches: &ArgMatches) -> Result<()> {
    let (disc, program, season, episodes, map) = compute_mapping(config, matches).await?;
    print_mapping(&disc, &episodes, &map);

    let library = Library::new(config.library.data_dir.clone()).await?;
    let ripper = Ripper::new(config.clone());
    for (episode, target) in map.iter() {
        ripper
            .rip_episode(&disc, &program, season, episode, target)
            .await?;
        library
            .record_rip(
                &program,
                season,
                episode.number,
                RipRecord::for_target(&disc.fingerprint, target),
            )
            .await?;
    }
    info!("🎉 Ripped {} episode(s)", map.len());
    Ok(())
}

/// Scan the source and map its unassigned titles onto unripped episodes
async fn compute_mapping(
    config: &Config,
    matches: &ArgMatches,
) -> Result<(Disc, String, u32, Vec<Episode>, EpisodeMap)> {
    let (program_name, season_number) = selected_program(config)?;
    let library = Library::new(config.library.data_dir.clone()).await?;
    let program = library
        .get_program(&program_name)
        .await
        .ok_or_else(|| anyhow!("unknown program: {}", program_name))?;
    let episodes = library.unripped_episodes(&program_name, season_number).await?;
    if episodes.is_empty() {
        return Err(anyhow!(
            "every episode of {} season {} is already ripped",
            program_name,
            season_number
        ));
    }

    let scanner = DiscScanner::new(&config.paths.handbrake);
    let disc = scanner.scan(&config.rip.source).await?;
    let titles = unassigned_titles(&disc, &program);

    let mut prompt = PromptResolver;
    let mut pick_first = FirstSolutionResolver;
    let resolver: &mut dyn SolutionResolver = if matches.get_flag("first") {
        &mut pick_first
    } else {
        &mut prompt
    };

    let map = automap(
        &titles,
        &episodes,
        &config.duration_window(),
        Some(resolver),
        config.chapter_options(),
    )?;
    Ok((disc, program_name, season_number, episodes, map))
}

/// Titles of the disc not already used by a whole-title rip of this program
fn unassigned_titles(disc: &Disc, program: &Program) -> Vec<Title> {
    let used: HashSet<u32> = program
        .seasons
        .iter()
        .flat_map(|s| s.episodes.iter())
        .filter_map(|e| e.ripped.as_ref())
        .filter(|r| r.disc_fingerprint == disc.fingerprint && r.start_chapter.is_none())
        .map(|r| r.title)
        .collect();
    disc.titles
        .iter()
        .filter(|t| !used.contains(&t.number))
        .cloned()
        .collect()
}

fn print_mapping(disc: &Disc, episodes: &[Episode], map: &EpisodeMap) {
    for (episode, target) in map.iter() {
        let duration = disc
            .title(match target {
                MapTarget::Title(n) => *n,
                MapTarget::Chapters { title, .. } => *title,
            })
            .map(|title| match target {
                MapTarget::Title(_) => title.duration,
                MapTarget::Chapters { first, last, .. } => {
                    title.chapters_duration(*first, *last)
                }
            })
            .unwrap_or_default();
        println!(
            "Episode {} ({}) = {} ({})",
            episode.number,
            episode.name,
            target,
            format_duration(duration)
        );
    }
    if map.len() < episodes.len() {
        println!(
            "{} of {} unripped episode(s) remain unmapped",
            episodes.len() - map.len(),
            episodes.len()
        );
    }
}

async fn run_episodes(config: &Config) -> Result<()> {
    let (program_name, season_number) = selected_program(config)?;
    let library = Library::new(config.library.data_dir.clone()).await?;
    let program = library
        .get_program(&program_name)
        .await
        .ok_or_else(|| anyhow!("unknown program: {}", program_name))?;
    let season = program
        .season(season_number)
        .ok_or_else(|| anyhow!("{} has no season {}", program_name, season_number))?;

    println!("{} season {}:", program.name, season.number);
    for episode in &season.episodes {
        let status = match &episode.ripped {
            Some(record) => format!(
                " [ripped: {} on {}]",
                match (record.start_chapter, record.end_chapter) {
                    (Some(first), Some(last)) => format!("title {} chapters {}-{}", record.title, first, last),
                    _ => format!("title {}", record.title),
                },
                record.ripped_at.format("%Y-%m-%d"),
            ),
            None => String::new(),
        };
        println!("{:3}. {}{}", episode.number, episode.name, status);
    }
    Ok(())
}

async fn run_define(config: &Config, matches: &ArgMatches) -> Result<()> {
    let (program_name, season_number) = selected_program(config)?;
    let names: Vec<String> = matches
        .get_many::<String>("names")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let library = Library::new(config.library.data_dir.clone()).await?;
    let mut program = library
        .get_program(&program_name)
        .await
        .unwrap_or_else(|| Program::new(program_name.clone()));
    if program.season(season_number).is_none() {
        program.seasons.push(Season::new(season_number));
        program.seasons.sort_by_key(|s| s.number);
    }
    let season = program
        .season_mut(season_number)
        .ok_or_else(|| anyhow!("season {} missing after insert", season_number))?;
    season.episodes = names
        .iter()
        .enumerate()
        .map(|(i, name)| Episode::new(i as u32 + 1, name.clone()))
        .collect();
    let count = season.episodes.len();
    library.save_program(program).await?;
    info!(
        "💾 Defined {} episode(s) for {} season {}",
        count, program_name, season_number
    );
    Ok(())
}

/// Interactive resolver for ambiguous chapter mappings
///
/// Prints every candidate and keeps prompting until the operator enters a
/// valid 1-based solution number; end of input declines.
struct PromptResolver;

impl SolutionResolver for PromptResolver {
    fn resolve(&mut self, candidates: &[Candidate]) -> Option<usize> {
        println!("Found {} potential chapter mappings", candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            println!();
            println!("Solution {}", index + 1);
            println!("{}", candidate);
        }
        println!();
        let mut prompt = format!("Enter solution number to use [1-{}] ", candidates.len());
        loop {
            print!("{}", prompt);
            io::stdout().flush().ok();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            match line.trim().parse::<usize>() {
                Ok(choice) if (1..=candidates.len()).contains(&choice) => return Some(choice),
                _ => {
                    prompt = format!(
                        "Invalid input. Please enter a number [1-{}] ",
                        candidates.len()
                    );
                }
            }
        }
    }
}
