/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.
///
/// Entities draw at their render position (tile-fraction precision,
/// rounded to half a tile horizontally, one row vertically), so glides
/// read as motion even on a character grid.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::anim::frame;
use crate::domain::entity::{Entity, EntityKind};
use crate::sim::grid::BorderPiece;
use crate::sim::level::{Camera, Level};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 16],  // up to 16 bytes (supports multi-codepoint sequences)
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool,    // true = this char occupies 2 terminal columns
    cont: bool,    // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells.
    ///
    /// On VTE-based Linux terminals (GNOME Terminal, etc.), the inter-row gap
    /// pixels use the background color from the last Clear or the terminal's
    /// configured default.  By using the SAME explicit RGB for both
    /// `Clear(ClearType::All)` and every cell's background, the gap color
    /// matches the cell color exactly, eliminating visible horizontal lines.
    ///
    /// If your terminal's own background differs from this value, set it to
    /// RGB(22,22,35) in your terminal preferences for a seamless look.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0,0,0, 0,0,0,0, 0,0,0,0, 0,0,0,0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 16],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell {
        ch: [b'?', 0,0,0, 0,0,0,0, 0,0,0,0, 0,0,0,0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.ch_len = len;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    /// Create a wide cell from a (possibly multi-codepoint) string,
    /// e.g. an emoji with a variation selector.
    fn from_str_wide(s: &str, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let bytes = s.as_bytes();
        let len = bytes.len().min(16);
        cell.ch[..len].copy_from_slice(&bytes[..len]);
        cell.ch_len = len as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        if self.ch_len == 0 { return ""; }
        unsafe { std::str::from_utf8_unchecked(&self.ch[..self.ch_len as usize]) }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width { break; }
            self.set(cx, y, Cell::from_char(ch, fg, bg));
            cx += 1;
        }
    }
}

// ── Theme: glyph and palette lookup ──

/// What a frame id looks like on a character grid: either two narrow
/// chars filling the game cell, or one wide glyph plus a continuation.
enum Glyph {
    Pair(char, char, Color, Color),
    Wide(&'static str),
}

/// All colors and glyph choices in one place. Built once in `main` and
/// handed to the renderer at startup; nothing here is read through a
/// global.
pub struct Theme {
    pub rock_fg: Color,
    pub rock_bg: Color,
    pub dirt_fg: Color,
    pub dirt_bg: Color,
    pub frame_fg: Color,
    pub frame_bg: Color,
    pub hud_bg: Color,
    pub message_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            rock_fg: Color::Rgb { r: 175, g: 175, b: 190 },
            rock_bg: Color::Rgb { r: 55, g: 55, b: 70 },
            dirt_fg: Color::Rgb { r: 190, g: 130, b: 60 },
            dirt_bg: Color::Rgb { r: 95, g: 60, b: 25 },
            frame_fg: Color::Rgb { r: 150, g: 150, b: 170 },
            frame_bg: Color::Rgb { r: 42, g: 42, b: 58 },
            hud_bg: Color::Rgb { r: 20, g: 20, b: 60 },
            message_bg: Color::Rgb { r: 200, g: 180, b: 50 },
        }
    }
}

impl Theme {
    fn glyph_for(&self, id: u16, exit_open: bool) -> Glyph {
        match id {
            frame::ROCK => Glyph::Pair('(', ')', self.rock_fg, self.rock_bg),
            frame::TERRAIN => Glyph::Pair('▒', '▒', self.dirt_fg, self.dirt_bg),
            frame::PICKUP => Glyph::Wide("💎"),
            frame::CHIP => Glyph::Pair('▤', '▤', Color::Rgb{r:120,g:180,b:220}, Color::Rgb{r:30,g:50,b:70}),
            frame::WALL => Glyph::Pair('█', '█', Color::Rgb{r:120,g:120,b:120}, Color::Rgb{r:70,g:70,b:70}),
            frame::EXIT if exit_open => Glyph::Pair('[', ']', Color::Rgb{r:120,g:255,b:120}, Color::Rgb{r:20,g:90,b:20}),
            frame::EXIT => Glyph::Pair('[', ']', Color::Rgb{r:60,g:140,b:60}, Color::Rgb{r:20,g:40,b:20}),
            frame::ORANGE_DISK => Glyph::Pair('(', ')', Color::Rgb{r:255,g:150,b:40}, Color::Rgb{r:90,g:50,b:0}),
            frame::TERMINAL => Glyph::Pair('▦', '▦', Color::Rgb{r:100,g:200,b:255}, Color::Rgb{r:0,g:40,b:60}),
            frame::SNIK_SNAK => Glyph::Pair('>', '<', Color::Rgb{r:255,g:80,b:80}, Cell::BASE_BG),
            frame::ELECTRON => Glyph::Pair('*', '*', Color::Rgb{r:255,g:255,b:120}, Cell::BASE_BG),

            frame::IDLE_LEFT | frame::IDLE_RIGHT => Glyph::Wide("🧍"),

            // Walk phases: out-and-back stride
            id if id == frame::WALK_LEFT || id == frame::WALK_RIGHT => Glyph::Wide("🧍"),
            id if id == frame::WALK_LEFT + 1 || id == frame::WALK_RIGHT + 1 => Glyph::Wide("🚶"),
            id if id == frame::WALK_LEFT + 2 || id == frame::WALK_RIGHT + 2 => Glyph::Wide("🏃"),

            frame::DIG_LEFT | frame::DIG_RIGHT | frame::DIG_UP | frame::DIG_DOWN => {
                Glyph::Wide("⛏\u{fe0f}")
            }

            // Rolling rock: rotating strokes
            id if id == frame::ROLL => Glyph::Pair('(', ')', self.rock_fg, self.rock_bg),
            id if id == frame::ROLL + 1 => Glyph::Pair('/', '/', self.rock_fg, self.rock_bg),
            id if id == frame::ROLL + 2 => Glyph::Pair('\\', '\\', self.rock_fg, self.rock_bg),

            // Terrain crumbling away
            id if id == frame::CLEAR => Glyph::Pair('▒', '▒', self.dirt_fg, self.dirt_bg),
            id if id == frame::CLEAR + 1 => Glyph::Pair('▒', '░', self.dirt_fg, Color::Rgb{r:75,g:48,b:20}),
            id if id == frame::CLEAR + 2 => Glyph::Pair('░', '░', self.dirt_fg, Color::Rgb{r:55,g:36,b:15}),
            id if id == frame::CLEAR + 3 => Glyph::Pair('░', '·', Color::Rgb{r:140,g:95,b:45}, Color::Rgb{r:38,g:26,b:12}),
            id if id == frame::CLEAR + 4 => Glyph::Pair('·', '·', Color::Rgb{r:100,g:70,b:35}, Cell::BASE_BG),

            // Pickup sparkling out
            id if id == frame::COLLECT || id == frame::COLLECT + 1 => Glyph::Wide("💎"),
            id if id == frame::COLLECT + 2 || id == frame::COLLECT + 3 => {
                Glyph::Pair('◆', '◆', Color::Rgb{r:120,g:220,b:255}, Cell::BASE_BG)
            }
            id if id == frame::COLLECT + 4 => Glyph::Pair('◇', '◇', Color::Rgb{r:100,g:190,b:230}, Cell::BASE_BG),
            id if id == frame::COLLECT + 5 => Glyph::Pair('·', '·', Color::Rgb{r:80,g:150,b:190}, Cell::BASE_BG),
            id if id == frame::COLLECT + 6 => Glyph::Pair(' ', ' ', Color::White, Cell::BASE_BG),

            _ => Glyph::Pair('?', '?', Color::Magenta, Cell::BASE_BG),
        }
    }
}

// ── Renderer ──

/// Total terminal columns needed = map_width * 2 (each game cell = 2 terminal cols)
/// We use a 1:1 terminal-column buffer, so game cell (gx) maps to columns (gx*2, gx*2+1).
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    theme: Theme,
    enhanced_keys: bool,
}

impl Renderer {
    pub fn new(theme: Theme) -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            theme,
            enhanced_keys: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        // Ask for key release reporting where the terminal supports it;
        // input falls back to hold timeouts everywhere else.
        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.enhanced_keys = true;
        }

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Whether the terminal reports key release events.
    pub fn enhanced_keys(&self) -> bool {
        self.enhanced_keys
    }

    /// Force a full repaint on the next frame. Call on level change.
    pub fn invalidate(&mut self) {
        self.back.cells.fill(Cell::INVALID);
    }

    pub fn render(&mut self, level: &mut Level) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            // Force full repaint after resize.
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Update camera viewport dimensions from terminal size.
        // The +2 leaves room for the frame ring around the playfield.
        let reserved_rows = MAP_ROW + 4; // HUD + gap + msg + help
        let max_view_h = if self.term_h > reserved_rows {
            (self.term_h - reserved_rows) as i32
        } else {
            1
        };
        let fresh_camera = level.camera.view_w == 0 || level.camera.view_h == 0;
        level.camera.view_w = ((self.term_w / CELL_W) as i32).min(level.grid.width() + 2);
        level.camera.view_h = max_view_h.min(level.grid.height() + 2);

        // Place the camera now that view_w/view_h are up to date: snap
        // to the player on a freshly loaded level, dead-zone follow on
        // every later frame.
        let target = level.player_entity().map(|p| (p.x, p.y));
        if let Some((px, py)) = target {
            if fresh_camera {
                level
                    .camera
                    .center_on(px, py, level.grid.width(), level.grid.height());
            } else {
                level
                    .camera
                    .follow(px, py, level.grid.width(), level.grid.height());
            }
        }

        // Build front buffer
        self.front.clear();
        self.compose_game(level);

        // Diff and emit
        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Set explicit base colors at start of frame.
        // IMPORTANT: Do NOT use ResetColor here — it resets to the terminal's
        // native default, which may differ from BASE_BG and cause line artifacts.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                // Skip continuation cells (right half of wide glyph)
                if cell.cont {
                    if cell != prev { need_move = true; }
                    x += 1;
                    continue;
                }

                // For wide cells, also check if the continuation changed
                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                // Position cursor if needed
                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                // Set colors only if changed
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    // Wide char printed: cursor advanced 2 columns
                    last_x = x + 1;
                    x += 2; // skip the continuation cell
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, level: &Level) {
        let buf_w = self.front.width;
        let cam = level.camera.clone();

        // ── HUD row ──
        let mut status = String::new();
        if level.gravity {
            status.push_str("GRAVITY  ");
        }
        if level.freeze_rocks {
            status.push_str("FROZEN  ");
        }
        if level.exit_open {
            status.push_str("EXIT OPEN");
        }
        let hud = format!(
            " Cave {:>2}/{:<2}  {:<23}  ◆ {:>3}/{:<3}  {} ",
            level.current_level + 1, level.total_levels, level.title,
            level.collected, level.required, status,
        );
        let hud_bg = self.theme.hud_bg;
        for x in 0..buf_w {
            self.front.set(x, HUD_ROW, Cell::from_char(' ', Color::White, hud_bg));
        }
        self.front.put_str(0, HUD_ROW, &hud, Color::White, hud_bg);

        // ── Playfield background + frame ring (camera viewport) ──
        let frame_fg = self.theme.frame_fg;
        let frame_bg = self.theme.frame_bg;
        for vy in 0..cam.view_h {
            let wy = cam.y + vy;
            let row = MAP_ROW + vy as usize;
            if row >= self.front.height { break; }

            for vx in 0..cam.view_w {
                let wx = cam.x + vx;
                let col = vx as usize * CELL_W;
                if col + 1 >= buf_w { break; }

                if level.grid.in_bounds(wx, wy) {
                    self.front.set(col, row, Cell::from_char(' ', Color::White, Cell::BASE_BG));
                    self.front.set(col + 1, row, Cell::from_char(' ', Color::White, Cell::BASE_BG));
                } else if let Some(piece) = level.grid.border_piece(wx, wy) {
                    let (c0, c1) = match piece {
                        BorderPiece::Corner => ('╬', '═'),
                        BorderPiece::Horizontal => ('═', '═'),
                        BorderPiece::Vertical => ('║', ' '),
                    };
                    self.front.set(col, row, Cell::from_char(c0, frame_fg, frame_bg));
                    self.front.set(col + 1, row, Cell::from_char(c1, frame_fg, frame_bg));
                } else {
                    self.front.set(col, row, Cell::from_char(' ', Color::White, Cell::BASE_BG));
                    self.front.set(col + 1, row, Cell::from_char(' ', Color::White, Cell::BASE_BG));
                }
            }
        }

        // ── Entities (player drawn last, over everything) ──
        let x0 = cam.x - 1;
        let y0 = cam.y - 1;
        let x1 = cam.x + cam.view_w;
        let y1 = cam.y + cam.view_h;
        for e in level.entities_in_region(x0, y0, x1, y1) {
            if matches!(e.kind, EntityKind::Player(_)) {
                continue;
            }
            self.draw_entity(&cam, level.exit_open, e);
        }
        if let Some(p) = level.player_entity() {
            self.draw_entity(&cam, level.exit_open, p);
        }

        // ── Message bar ──
        let msg_row = MAP_ROW + cam.view_h as usize + 1;
        if msg_row < self.front.height && !level.message.is_empty() {
            let msg = format!(" ◈ {} ", level.message);
            let msg_bg = self.theme.message_bg;
            for x in 0..buf_w {
                self.front.set(x, msg_row, Cell::from_char(' ', Color::Black, msg_bg));
            }
            self.front.put_str(0, msg_row, &msg, Color::Black, msg_bg);
        }

        // ── Help bar ──
        let help_row = MAP_ROW + cam.view_h as usize + 3;
        if help_row < self.front.height {
            let help = " ←→↑↓/WASD:Move  Space+Move:Dig  R:Restart  ESC:Quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    /// Draw one entity at its render position (world → screen via camera).
    fn draw_entity(&mut self, cam: &Camera, exit_open: bool, e: &Entity) {
        let (ex, ey) = e.render_pos();
        let col_f = (ex - cam.x as f32) * CELL_W as f32;
        let row_f = ey - cam.y as f32;
        let col = col_f.round() as i32;
        let row = row_f.round() as i32;

        if row < 0 || row >= cam.view_h || col < 0 || col + 1 >= cam.view_w * CELL_W as i32 + 1 {
            return;
        }
        let col = col as usize;
        let row = MAP_ROW + row as usize;
        if col + 1 >= self.front.width || row >= self.front.height {
            return;
        }

        match self.theme.glyph_for(e.frame(), exit_open) {
            Glyph::Pair(c0, c1, fg, bg) => {
                self.front.set(col, row, Cell::from_char(c0, fg, bg));
                self.front.set(col + 1, row, Cell::from_char(c1, fg, bg));
            }
            Glyph::Wide(s) => {
                self.front.set(col, row, Cell::from_str_wide(s, Color::Reset, Color::Reset));
                self.front.set(col + 1, row, Cell::WIDE_CONT);
            }
        }
    }
}
