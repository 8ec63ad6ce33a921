use beastem_core::core::machine::Machine;
use sdl2::event::Event;
use sdl2::keyboard::Scancode;

use beastem::listing::Listing;
use beastem::runmode::{RunMode, RunModeController};
use beastem::system::Beast;

use crate::assets::AssetPaths;
use crate::audio;
use crate::input::KeyMap;
use crate::overlay;
use crate::video::Video;

/// SDL window/event loop. While `run_mode` is `Run`, keystrokes feed the
/// emulated keyboard matrix; in every other (paused) mode they drive the
/// debugger's mode switch instead, matching the front panel's split
/// between "typing into the Beast" and "driving the debugger".
#[allow(clippy::too_many_arguments)]
pub fn run(
    beast: &mut Beast,
    run_mode: &mut RunModeController,
    key_map: &KeyMap,
    listing: &Listing,
    _assets: &AssetPaths,
    sample_rate: u32,
    volume: u8,
    zoom: f32,
) {
    let sdl_context = sdl2::init().expect("Failed to initialize SDL2");
    let sdl_video = sdl_context.video().expect("Failed to init SDL video");
    let sdl_audio = sdl_context.audio().expect("Failed to init SDL audio");

    let (width, height) = beast.display_size();
    let mut video = Video::new(&sdl_video, "Feersum MicroBeast Emulator", width, height, zoom);
    let mut event_pump = sdl_context.event_pump().expect("Failed to get event pump");

    let audio_handle = audio::init(&sdl_audio, sample_rate);
    if let Some((device, _, _)) = &audio_handle {
        device.resume();
    }
    let _ = volume; // already latched into `beast` by the caller.

    let buffer_size = (width * height * 3) as usize;
    let mut framebuffer = vec![0u8; buffer_size];

    'main: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'main,

                Event::KeyDown { scancode: Some(Scancode::Escape), .. } => {
                    run_mode.set_mode(RunMode::Debug, beast);
                }

                Event::KeyDown { scancode: Some(sc), repeat: false, .. } if run_mode.mode() == RunMode::Run => {
                    if let Some(button) = key_map.get(sc) {
                        beast.set_input(button, true);
                    }
                }
                Event::KeyUp { scancode: Some(sc), .. } if run_mode.mode() == RunMode::Run => {
                    if let Some(button) = key_map.get(sc) {
                        beast.set_input(button, false);
                    }
                }

                Event::KeyDown { scancode: Some(sc), repeat: false, .. } => {
                    handle_debugger_key(sc, run_mode, beast);
                }

                _ => {}
            }
        }

        if run_mode.mode() == RunMode::Quit {
            break 'main;
        }

        run_mode.drive_frame(beast);
        beast.reload_updated_files();

        beast.render_frame(&mut framebuffer);
        if run_mode.mode() != RunMode::Run {
            let mut text = format!("{:04X}.{}", beast.cpu.pc, overlay::mode_code(run_mode.mode()));
            if let Some(location) = listing.location(beast.cpu.pc as u32) {
                if let Some(line) = listing.line(location) {
                    text.push(' ');
                    text.push_str(line.head.trim());
                }
            }
            overlay::draw_text(&mut framebuffer, width as usize, &text);
        }
        video.present(&framebuffer);

        if let Some((_, ring, _)) = &audio_handle {
            let mut scratch = [0i16; 512];
            let n = beast.fill_audio(&mut scratch);
            if n > 0 {
                let mut buf = ring.lock().unwrap();
                buf.extend(scratch[..n].iter().copied());
            }
        }
    }

    if let Some((device, _, fade_out)) = &audio_handle {
        fade_out.store(true, std::sync::atomic::Ordering::Relaxed);
        std::thread::sleep(audio::fade_out_duration());
        device.pause();
    }
}

/// Mode-switch keys active whenever the machine isn't free-running, one
/// letter per front-panel command (`r`un, `s`tep, step-`o`ver, step-o`u`t,
/// `t`ake-branch, reset-and-step(`e`), `f`iles, `b`reakpoints, `w`atchpoints,
/// `q`uit).
fn handle_debugger_key(sc: Scancode, run_mode: &mut RunModeController, beast: &mut Beast) {
    match sc {
        Scancode::R => run_mode.set_mode(RunMode::Run, beast),
        Scancode::S => run_mode.set_mode(RunMode::Step, beast),
        Scancode::O => run_mode.set_mode(RunMode::Over, beast),
        Scancode::U => run_mode.set_mode(RunMode::Out, beast),
        Scancode::T => run_mode.set_mode(RunMode::Take, beast),
        Scancode::F => run_mode.set_mode(RunMode::Files, beast),
        Scancode::B => run_mode.set_mode(RunMode::Breakpoints, beast),
        Scancode::W => run_mode.set_mode(RunMode::Watchpoints, beast),
        Scancode::Q => run_mode.set_mode(RunMode::Quit, beast),
        Scancode::E => {
            beast.reset();
            run_mode.set_mode(RunMode::Step, beast);
        }
        _ => {}
    }
}
