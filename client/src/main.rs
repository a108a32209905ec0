use clap::Parser;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::{NetworkClient, NetworkEvent};
use client::rendering::{MacroquadMetrics, Renderer};
use log::{error, info, warn};
use macroquad::prelude::*;
use shared::{WORLD_HEIGHT, WORLD_WIDTH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay URL to connect to
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Coinhop".to_owned(),
        window_width: WORLD_WIDTH as i32,
        window_height: WORLD_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    info!("Controls: A/D to move, W/Space to jump, T to write");

    let mut network = match NetworkClient::connect(&args.server) {
        Ok(network) => network,
        Err(e) => {
            error!("Failed to start network thread: {}", e);
            return;
        }
    };

    let mut game = ClientGameState::new();
    let mut input = InputManager::new();
    let mut renderer = Renderer::new();
    let metrics = MacroquadMetrics;

    loop {
        for event in network.poll() {
            match event {
                NetworkEvent::Connected => info!("Connected to relay"),
                NetworkEvent::Packet(packet) => game.apply_server_packet(packet),
                NetworkEvent::Closed(reason) => {
                    warn!("Disconnected: {}", reason);
                    game.connection_lost();
                }
            }
        }

        let frame = input.update();

        // A text only becomes pending if it can actually be sent.
        if let Some(placement) = frame.placement.filter(|_| network.is_connected()) {
            if let Some(packet) = game.place_text(placement.x, placement.y, &placement.content) {
                network.send(packet);
            }
        }

        if frame.typing {
            network.send(game.position_packet());
        } else {
            for packet in game.step(&frame.controls, &metrics) {
                network.send(packet);
            }
        }

        renderer.render(&game, &metrics, input.typing_buffer(), network.is_connected());

        next_frame().await;
    }
}
