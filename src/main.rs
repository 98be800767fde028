// Release builds on Windows use the GUI subsystem, so no console window pops
// up behind the editor.  The CLI then has to borrow the launching terminal's
// console before anything is printed.
#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use std::process::ExitCode;

use eframe::egui;
use stickerstudio::app::StickerStudioApp;
use stickerstudio::cli;
use stickerstudio::logger;
use stickerstudio::surface::{ShapeGeom, Surface};
use stickerstudio::units::Rect;

fn main() -> ExitCode {
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        #[cfg(windows)]
        attach_parent_console();
        logger::init();
        return cli::run(cli::CliArgs::parse());
    }

    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 600.0])
            .with_title("StickerStudio")
            .with_icon(std::sync::Arc::new(app_icon())),
        ..Default::default()
    };

    match eframe::run_native(
        "StickerStudio",
        options,
        Box::new(|cc| Box::new(StickerStudioApp::new(cc))),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::write(logger::Level::Error, &format!("Window failed: {}", e));
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Route stdout/stderr to the console of the process that launched us.
#[cfg(windows)]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(process_id: u32) -> i32;
        fn SetStdHandle(std_handle: u32, handle: isize) -> i32;
        fn CreateFileW(
            name: *const u16,
            access: u32,
            share_mode: u32,
            security: *const std::ffi::c_void,
            disposition: u32,
            flags: u32,
            template: isize,
        ) -> isize;
    }
    const ATTACH_PARENT_PROCESS: u32 = u32::MAX;
    const GENERIC_WRITE: u32 = 0x4000_0000;
    const SHARE_READ_WRITE: u32 = 0x3;
    const OPEN_EXISTING: u32 = 3;
    const STD_OUTPUT_HANDLE: u32 = -11i32 as u32;
    const STD_ERROR_HANDLE: u32 = -12i32 as u32;

    let conout: Vec<u16> = "CONOUT$\0".encode_utf16().collect();
    unsafe {
        if AttachConsole(ATTACH_PARENT_PROCESS) == 0 {
            return;
        }
        let out = CreateFileW(
            conout.as_ptr(),
            GENERIC_WRITE,
            SHARE_READ_WRITE,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            0,
        );
        if out != -1 {
            SetStdHandle(STD_OUTPUT_HANDLE, out);
            SetStdHandle(STD_ERROR_HANDLE, out);
        }
    }
}

/// A white-bordered red disc, painted with the canvas rasterizer.
fn app_icon() -> egui::viewport::IconData {
    const SIZE: u32 = 64;
    let mut surface = Surface::new(SIZE, SIZE);
    let c = SIZE as f32 * 0.5;
    surface.fill_shape(ShapeGeom::Circle { cx: c, cy: c, r: c - 1.0 }, [255, 255, 255, 255]);
    surface.fill_shape(ShapeGeom::Circle { cx: c, cy: c, r: c - 7.0 }, [0xff, 0x6b, 0x6b, 255]);
    surface.fill_rect(Rect::new(c - 10.0, c - 3.0, 20.0, 6.0), [255, 255, 255, 230]);
    egui::viewport::IconData {
        rgba: surface.into_image().into_raw(),
        width: SIZE,
        height: SIZE,
    }
}
