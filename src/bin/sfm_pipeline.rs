use std::path::Path;

use clap::{Parser, Subcommand};
use sequential_sfm::config::PipelineConfig;
use sequential_sfm::engines::{
    CommandFeatureExtractor, CommandMatcher, CommandReconstructor, CommandSegmenter,
    parse_camera_params,
};
use sequential_sfm::error::Result;
use sequential_sfm::pipeline::{BatchReport, Pipeline};

#[derive(Parser)]
#[command(version, about, author)]
struct SsfmCli {
    /// path to a pipeline config json; defaults apply when omitted
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// sample videos into frame sequences
    Preprocess {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,
    },
    /// segment moving objects and write matcher keep-masks
    Mask {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,
    },
    /// extract, pair, match, reconstruct
    Sfm {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,

        /// fixed camera intrinsics, comma separated (f,cx,cy,k)
        #[arg(short, long)]
        cparam: Option<String>,
    },
    /// project the trajectory and plot track, velocity, curvature
    Plot {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,
    },
    /// all four stages in sequence
    Pipeline {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<String>,

        /// fixed camera intrinsics, comma separated (f,cx,cy,k)
        #[arg(short, long)]
        cparam: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = SsfmCli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json(Path::new(path))?,
        None => PipelineConfig::default(),
    };

    let extractor = CommandFeatureExtractor::new(config.tools.extractor.as_str());
    let matcher = CommandMatcher::new(config.tools.matcher.as_str());
    let reconstructor = CommandReconstructor::new(config.tools.reconstructor.as_str());
    let segmenter = CommandSegmenter::new(config.tools.segmenter.as_str());
    let pipeline = Pipeline {
        config,
        extractor: &extractor,
        matcher: &matcher,
        reconstructor: &reconstructor,
        segmenter: &segmenter,
    };

    let report = match &cli.command {
        Commands::Preprocess { input } => BatchReport::new(pipeline.preprocess(input)),
        Commands::Mask { input } => BatchReport::new(pipeline.mask(input)),
        Commands::Sfm { input, cparam } => {
            let cparam = cparam.as_deref().map(parse_camera_params).transpose()?;
            BatchReport::new(pipeline.sfm(input, cparam.as_deref()))
        }
        Commands::Plot { input } => BatchReport::new(pipeline.plot(input)),
        Commands::Pipeline { input, cparam } => {
            let cparam = cparam.as_deref().map(parse_camera_params).transpose()?;
            pipeline.run(input, cparam.as_deref())
        }
    };

    report.log_summary();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
