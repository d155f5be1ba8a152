//! Run window calibration on a saved screenshot instead of the live desktop.
//!
//!     calibrate-png <screenshot.png> [signature-hex] [out.png]
//!
//! Prints the detected game origin and, when `out.png` is given, writes the
//! 960x600 game area cropped at that origin.

use std::path::Path;

use nguctl_core::platform::stub::StubPlatform;
use nguctl_core::settings::Settings;
use nguctl_core::types::{Capture, Color, Rect};
use nguctl_core::window;

const GAME_WIDTH: u32 = 960;
const GAME_HEIGHT: u32 = 600;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <screenshot.png> [signature-hex] [out.png]", args[0]);
        std::process::exit(2);
    }

    let img = match image::open(&args[1]) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            eprintln!("cannot open {}: {}", args[1], e);
            std::process::exit(1);
        }
    };

    let settings = Settings::default();
    let signature = match args.get(2) {
        Some(hex) => match hex.parse::<Color>() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(2);
            }
        },
        None => settings.signature_color,
    };

    let screen = Capture::from_image(&img);
    let (w, h) = (screen.width as i32, screen.height as i32);
    let stub = StubPlatform::with_screen(screen.clone());
    let win = stub.add_window("screenshot");

    // the configured region, clipped to the screenshot
    let r = settings.search_region;
    let region = Rect::new(r.x1.min(w - 1), r.y1.min(h - 1), r.x2.min(w), r.y2.min(h));
    println!("Image: {}x{}, searching {:?} for {}", w, h, region, signature);

    let origin = match window::calibrate(&stub, win, signature, region) {
        Ok(origin) => origin,
        Err(e) => {
            println!("{}", e);
            std::process::exit(1);
        }
    };
    println!("Game detected at: {}", origin);

    if let Some(out) = args.get(3) {
        let fits = origin.x as u32 + GAME_WIDTH <= screen.width && origin.y as u32 + GAME_HEIGHT <= screen.height;
        if !fits {
            eprintln!("game area does not fit in the screenshot, not writing {}", out);
            std::process::exit(1);
        }
        let game = screen.crop(origin.x as u32, origin.y as u32, GAME_WIDTH, GAME_HEIGHT);
        match game.save_png(Path::new(out)) {
            Ok(()) => println!("Saved {}", out),
            Err(e) => {
                eprintln!("cannot write {}: {:#}", out, e);
                std::process::exit(1);
            }
        }
    }
}
