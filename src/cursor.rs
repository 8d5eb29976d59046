use std::{collections::HashMap, fs::File, io::Read, rc::Rc, time::Duration};

use anyhow::Context;

use smithay::{
    backend::renderer::{
        ImportAll, ImportMem, Renderer, Texture,
        element::{
            AsRenderElements, Kind,
            memory::{MemoryRenderBuffer, MemoryRenderBufferRenderElement},
            surface::{WaylandSurfaceRenderElement, render_elements_from_surface_tree},
        },
    },
    input::pointer::{CursorIcon, CursorImageStatus},
    render_elements,
    utils::{Physical, Point, Scale},
};
use tracing::{debug, warn};
use xcursor::{
    CursorTheme,
    parser::{Image, parse_xcursor},
};

pub struct PointerElement {
    buffer: Option<MemoryRenderBuffer>,
    status: CursorImageStatus,
}

impl Default for PointerElement {
    fn default() -> Self {
        Self {
            buffer: None,
            status: CursorImageStatus::default_named(),
        }
    }
}

impl PointerElement {
    pub fn set_status(&mut self, status: CursorImageStatus) {
        self.status = status;
    }

    pub fn set_buffer(&mut self, buffer: MemoryRenderBuffer) {
        self.buffer = Some(buffer);
    }
}

render_elements! {
    pub PointerRenderElement<R> where R: ImportAll + ImportMem;
    Surface=WaylandSurfaceRenderElement<R>,
    Memory=MemoryRenderBufferRenderElement<R>,
}

impl<T, R> AsRenderElements<R> for PointerElement
where
    T: Texture + Clone + Send + 'static,
    R: Renderer<TextureId = T> + ImportAll + ImportMem,
{
    type RenderElement = PointerRenderElement<R>;

    fn render_elements<E>(
        &self,
        renderer: &mut R,
        location: Point<i32, Physical>,
        scale: Scale<f64>,
        alpha: f32,
    ) -> Vec<E>
    where
        E: From<PointerRenderElement<R>>,
    {
        match &self.status {
            CursorImageStatus::Hidden => Vec::new(),
            CursorImageStatus::Named(_) => {
                if let Some(buffer) = self.buffer.as_ref() {
                    MemoryRenderBufferRenderElement::from_buffer(
                        renderer,
                        location.to_f64(),
                        buffer,
                        None,
                        None,
                        None,
                        Kind::Cursor,
                    )
                    .map(|elem| vec![PointerRenderElement::<R>::from(elem).into()])
                    .unwrap_or_default()
                } else {
                    Vec::new()
                }
            }
            CursorImageStatus::Surface(surface) => {
                let elements: Vec<PointerRenderElement<R>> = render_elements_from_surface_tree(
                    renderer,
                    surface,
                    location,
                    scale,
                    alpha,
                    Kind::Cursor,
                );
                elements.into_iter().map(E::from).collect()
            }
        }
    }
}

/// xcursor theme from `XCURSOR_THEME`/`XCURSOR_SIZE`, loaded lazily per cursor name.
pub struct CursorThemeManager {
    theme: CursorTheme,
    size: u32,
    icons: HashMap<CursorIcon, Rc<[Image]>>,
    fallback: Rc<[Image]>,
}

impl CursorThemeManager {
    pub fn load() -> Self {
        let name = std::env::var("XCURSOR_THEME").unwrap_or_else(|_| "default".to_owned());
        let size = std::env::var("XCURSOR_SIZE")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(24);

        let theme = CursorTheme::load(&name);
        let fallback: Rc<[Image]> = match load_icon(&theme, CursorIcon::Default) {
            Ok(images) => images.into(),
            Err(err) => {
                warn!(theme = name, "Unable to load xcursor theme ({err:#}), using fallback cursor");
                vec![fallback_cursor_image()].into()
            }
        };

        Self {
            theme,
            size,
            icons: HashMap::new(),
            fallback,
        }
    }

    /// Frame of `icon` to show at `time`, using the default cursor when the theme lacks it.
    pub fn image(&mut self, icon: CursorIcon, scale: u32, time: Duration) -> Image {
        let images = match self.icons.get(&icon) {
            Some(images) => images.clone(),
            None => {
                let images: Rc<[Image]> = match load_icon(&self.theme, icon) {
                    Ok(images) => images.into(),
                    Err(err) => {
                        debug!(?icon, "cursor not in theme: {err:#}");
                        self.fallback.clone()
                    }
                };
                self.icons.insert(icon, images.clone());
                images
            }
        };

        frame(time.as_millis() as u32, self.size.saturating_mul(scale), &images)
            .unwrap_or_else(fallback_cursor_image)
    }
}

fn load_icon(theme: &CursorTheme, icon: CursorIcon) -> anyhow::Result<Vec<Image>> {
    let path = std::iter::once(icon.name())
        .chain(icon.alt_names().iter().copied())
        .find_map(|name| theme.load_icon(name))
        .with_context(|| format!("theme has no `{}` cursor", icon.name()))?;

    let mut file = File::open(&path)
        .with_context(|| format!("failed to open cursor file {}", path.display()))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .with_context(|| format!("failed to read cursor file {}", path.display()))?;

    let images = parse_xcursor(&data).context("failed to parse cursor data")?;
    anyhow::ensure!(!images.is_empty(), "cursor file has no images");
    Ok(images)
}

fn nearest_images(size: u32, images: &[Image]) -> impl Iterator<Item = &Image> {
    let nearest = images
        .iter()
        .min_by_key(|image| (size as i32 - image.size as i32).abs())
        .map(|image| (image.width, image.height));

    images
        .iter()
        .filter(move |image| nearest == Some((image.width, image.height)))
}

/// Picks the animation frame for `millis` among the images closest to `size`.
fn frame(mut millis: u32, size: u32, images: &[Image]) -> Option<Image> {
    let total_delay = nearest_images(size, images).fold(0, |acc, image| acc + image.delay);

    if total_delay == 0 {
        return nearest_images(size, images).next().cloned();
    }

    millis %= total_delay;

    for image in nearest_images(size, images) {
        if millis < image.delay {
            return Some(image.clone());
        }
        millis -= image.delay;
    }

    None
}

fn fallback_cursor_image() -> Image {
    const W: usize = 24;
    const H: usize = 24;

    let mut mask = vec![false; W * H];
    let idx = |x: usize, y: usize| y * W + x;

    for y in 0..16 {
        let right = (y / 2) + 1;
        for x in 0..=right {
            mask[idx(x, y)] = true;
        }
    }

    for y in 10..23 {
        for x in 4..=8 {
            mask[idx(x, y)] = true;
        }
    }

    let mut outline = vec![false; W * H];
    for y in 0..H {
        for x in 0..W {
            if !mask[idx(x, y)] {
                continue;
            }
            for oy in -1isize..=1 {
                for ox in -1isize..=1 {
                    if ox == 0 && oy == 0 {
                        continue;
                    }
                    let nx = x as isize + ox;
                    let ny = y as isize + oy;
                    if nx < 0 || ny < 0 || nx >= W as isize || ny >= H as isize {
                        continue;
                    }
                    let nidx = idx(nx as usize, ny as usize);
                    if !mask[nidx] {
                        outline[nidx] = true;
                    }
                }
            }
        }
    }

    let mut pixels = vec![0u8; W * H * 4];
    for y in 0..H {
        for x in 0..W {
            let i = idx(x, y);
            let rgba = if mask[i] {
                [0, 0, 0, 255]
            } else if outline[i] {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 0]
            };

            let p = i * 4;
            pixels[p..p + 4].copy_from_slice(&rgba);
        }
    }

    Image {
        size: W as u32,
        width: W as u32,
        height: H as u32,
        xhot: 1,
        yhot: 1,
        delay: 1,
        pixels_rgba: pixels,
        pixels_argb: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn image(size: u32, delay: u32) -> Image {
        Image {
            size,
            width: size,
            height: size,
            xhot: 0,
            yhot: 0,
            delay,
            pixels_rgba: Vec::new(),
            pixels_argb: Vec::new(),
        }
    }

    #[test]
    fn frame_picks_nearest_size() {
        let images = [image(24, 0), image(48, 0)];
        assert_eq!(frame(0, 40, &images).map(|image| image.size), Some(48));
        assert_eq!(frame(0, 30, &images).map(|image| image.size), Some(24));
    }

    #[test]
    fn frame_follows_animation_delays() {
        let mut second = image(24, 30);
        second.xhot = 1;
        let images = [image(24, 10), second];

        assert_eq!(frame(5, 24, &images).map(|image| image.xhot), Some(0));
        assert_eq!(frame(15, 24, &images).map(|image| image.xhot), Some(1));
        // Wraps around after the full 40ms cycle.
        assert_eq!(frame(45, 24, &images).map(|image| image.xhot), Some(0));
    }

    #[test]
    fn frame_of_empty_list_is_none() {
        assert_eq!(frame(0, 24, &[]), None);
    }

    #[test]
    fn fallback_cursor_is_square_rgba() {
        let image = fallback_cursor_image();
        assert_eq!(image.pixels_rgba.len(), (image.width * image.height * 4) as usize);
    }
}
