// factory-devices/src/window.rs
//
// One SDL2 window per title. `q`, Escape or closing any window asks the
// dispatcher to stop.
use factory_pipeline::{DisplayError, DisplaySink};
use image::RgbImage;
use log::{debug, info};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect as SdlRect;
use sdl2::render::Canvas;
use sdl2::video::Window;
use sdl2::{EventPump, Sdl, VideoSubsystem};
use std::collections::HashMap;

pub struct WindowDisplay {
    _sdl: Sdl,
    video: VideoSubsystem,
    events: EventPump,
    windows: HashMap<String, Canvas<Window>>,
    quit: bool,
}

fn backend(what: &str, e: impl std::fmt::Display) -> DisplayError {
    DisplayError::Backend(format!("{what}: {e}"))
}

impl WindowDisplay {
    pub fn new() -> Result<Self, DisplayError> {
        let sdl = sdl2::init().map_err(|e| backend("Failed to initialize SDL2", e))?;
        let video = sdl
            .video()
            .map_err(|e| backend("Failed to get SDL2 video subsystem", e))?;
        let events = sdl
            .event_pump()
            .map_err(|e| backend("Failed to get SDL2 event pump", e))?;
        Ok(Self {
            _sdl: sdl,
            video,
            events,
            windows: HashMap::new(),
            quit: false,
        })
    }

    fn canvas(&mut self, title: &str, width: u32, height: u32) -> Result<&mut Canvas<Window>, DisplayError> {
        if !self.windows.contains_key(title) {
            let window = self
                .video
                .window(title, width, height)
                .position_centered()
                .resizable()
                .build()
                .map_err(|e| backend("Failed to build SDL2 window", e))?;
            let canvas = window
                .into_canvas()
                .accelerated()
                .build()
                .map_err(|e| backend("Failed to build SDL2 canvas", e))?;
            debug!("opened window {title} ({width}x{height})");
            self.windows.insert(title.to_string(), canvas);
        }
        self.windows
            .get_mut(title)
            .ok_or_else(|| DisplayError::Backend(format!("window {title} vanished")))
    }
}

impl DisplaySink for WindowDisplay {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<(), DisplayError> {
        let (width, height) = image.dimensions();
        let canvas = self.canvas(title, width, height)?;
        let creator = canvas.texture_creator();
        let mut texture = creator
            .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
            .map_err(|e| backend("Failed to create texture", e))?;

        let row_bytes = 3 * width as usize;
        texture
            .with_lock(None, |buffer: &mut [u8], pitch: usize| {
                for (y, row) in image.as_raw().chunks_exact(row_bytes).enumerate() {
                    let start = y * pitch;
                    buffer[start..start + row_bytes].copy_from_slice(row);
                }
            })
            .map_err(|e| backend("Failed to lock texture", e))?;

        canvas.clear();
        let (win_w, win_h) = canvas.window().size();
        canvas
            .copy(&texture, None, SdlRect::new(0, 0, win_w, win_h))
            .map_err(|e| backend("Failed to draw frame", e))?;
        canvas.present();
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        for event in self.events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Q | Keycode::Escape),
                    ..
                }
                | Event::Window {
                    win_event: WindowEvent::Close,
                    ..
                } => {
                    if !self.quit {
                        info!("quit requested from display");
                    }
                    self.quit = true;
                }
                _ => {}
            }
        }
        self.quit
    }
}
