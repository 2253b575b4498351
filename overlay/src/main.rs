use clap::Parser;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = overlay::factory::Cli::parse();
    match &cli.command {
        overlay::factory::Commands::Run(config) => {
            utils::allocator::GLOBAL_ALLOCATOR
                .set_limit(config.allocator_size)
                .expect("could not set up allocator_size limit");
            if config.enable_tracing {
                tracer::init_tracing("overlay-node", Some(&config.log_level));
            }
            let node = overlay::factory::bootstrap(config).await?;
            overlay::factory::run(config.clone(), node).await?;
        }
    }
    Ok(())
}
