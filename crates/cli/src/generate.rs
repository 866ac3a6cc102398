use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use media_luma::{
    AspectRatio, Generation, GenerationRequest, GenerationState, LumaClient, LumaConfig,
    PollPolicy, wait_for_generation,
};
use tracing::info;
use worlds_engine::TimelineId;

const STAGGER: Duration = Duration::from_secs(2);

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Timeline to generate
    #[arg(long, conflicts_with = "all")]
    timeline: Option<TimelineId>,

    /// Generate every timeline, 2 s apart
    #[arg(long)]
    all: bool,

    /// Override the timeline's built-in prompt
    #[arg(long, conflicts_with = "all")]
    prompt: Option<String>,

    /// Output aspect ratio (16:9, 9:16, 1:1, 4:3, 3:4, 21:9, 9:21)
    #[arg(long, default_value = "16:9")]
    aspect_ratio: AspectRatio,

    /// Ask for a seamlessly looping video
    #[arg(long = "loop")]
    loop_video: bool,

    /// Print the generation ids and exit without waiting
    #[arg(long)]
    no_wait: bool,

    /// Seconds between status checks
    #[arg(long, default_value = "5")]
    poll_interval: u64,

    /// Status checks before giving up
    #[arg(long, default_value = "60")]
    max_attempts: u32,
}

impl GenerateArgs {
    fn targets(&self) -> Result<Vec<TimelineId>> {
        match (self.all, self.timeline) {
            (true, _) => Ok(TimelineId::ALL.to_vec()),
            (false, Some(id)) => Ok(vec![id]),
            (false, None) => bail!("Pass --timeline <id> or --all"),
        }
    }

    fn request_for(&self, id: TimelineId) -> GenerationRequest {
        let prompt = self
            .prompt
            .clone()
            .unwrap_or_else(|| id.timeline().generation_prompt.to_owned());
        GenerationRequest::new(prompt)
            .aspect_ratio(self.aspect_ratio)
            .looping(self.loop_video)
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval),
            max_attempts: self.max_attempts,
        }
    }
}

pub fn run(args: GenerateArgs) -> Result<()> {
    let targets = args.targets()?;
    let client = LumaClient::new(LumaConfig::from_env());

    let mut started = Vec::with_capacity(targets.len());
    for (index, id) in targets.into_iter().enumerate() {
        if index > 0 {
            thread::sleep(STAGGER);
        }
        let generation = client
            .start(&args.request_for(id))
            .with_context(|| format!("Failed to start generation for {id}"))?;
        println!("{id}: {} ({})", generation.id, generation.state);
        started.push((id, generation));
    }

    if args.no_wait {
        return Ok(());
    }

    let policy = args.poll_policy();
    let mut failed = 0;
    for (id, generation) in started {
        let finished = if generation.state.is_terminal() {
            generation
        } else {
            wait_for_generation(&client, &generation.id, &policy, thread::sleep, |update| {
                info!(timeline = %id, state = %update.state, "generation progress");
            })
            .with_context(|| format!("Generation for {id} did not finish"))?
        };
        if !report(id, &finished) {
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{failed} generation(s) failed");
    }
    Ok(())
}

pub fn status(id: &str) -> Result<()> {
    let client = LumaClient::new(LumaConfig::from_env());
    let generation = client
        .poll(id)
        .with_context(|| format!("Failed to fetch generation {id}"))?;
    let json = serde_json::to_string_pretty(&generation).context("Failed to encode generation")?;
    println!("{json}");
    Ok(())
}

fn report(id: TimelineId, generation: &Generation) -> bool {
    match generation.state {
        GenerationState::Completed => {
            println!(
                "{id}: completed {}",
                generation.video_url().unwrap_or("(no video url)")
            );
            true
        }
        state => {
            println!(
                "{id}: {state} {}",
                generation.failure_reason.as_deref().unwrap_or("")
            );
            false
        }
    }
}
