use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::address_space::AddressSpace;
use crate::interrupts::{InterruptManager, InterruptType};

const P1: u16 = 0xff00;
const P14: u8 = 0x10;
const P15: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Right,
        Button::Left,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Select,
        Button::Start,
    ];

    /// Bit cleared in P1 while pressed.
    pub fn mask(self) -> u8 {
        match self {
            Button::Right | Button::A => 0x01,
            Button::Left | Button::B => 0x02,
            Button::Up | Button::Select => 0x04,
            Button::Down | Button::Start => 0x08,
        }
    }

    /// Select line (P14 directions, P15 buttons).
    pub fn line(self) -> u8 {
        match self {
            Button::Right | Button::Left | Button::Up | Button::Down => P14,
            _ => P15,
        }
    }
}

impl FromStr for Button {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "right" => Ok(Button::Right),
            "left" => Ok(Button::Left),
            "up" => Ok(Button::Up),
            "down" => Ok(Button::Down),
            "a" => Ok(Button::A),
            "b" => Ok(Button::B),
            "select" => Ok(Button::Select),
            "start" => Ok(Button::Start),
            other => Err(format!("unknown button '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed(Button),
    Released(Button),
}

/// Source of button events, drained once per frame.
pub trait Controller {
    fn poll(&mut self) -> Vec<ButtonEvent>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullController;

impl Controller for NullController {
    fn poll(&mut self) -> Vec<ButtonEvent> {
        Vec::new()
    }
}

/// Controller fed from another thread through a shared queue.
#[derive(Debug, Default, Clone)]
pub struct QueuedController {
    events: Arc<Mutex<VecDeque<ButtonEvent>>>,
}

impl QueuedController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: ButtonEvent) {
        if let Ok(mut q) = self.events.lock() {
            q.push_back(event);
        }
    }
}

impl Controller for QueuedController {
    fn poll(&mut self) -> Vec<ButtonEvent> {
        match self.events.lock() {
            Ok(mut q) => q.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// P1 register (FF00).
pub struct Joypad {
    interrupts: Rc<RefCell<InterruptManager>>,
    pressed: Vec<Button>,
    p1: u8,
}

impl Joypad {
    pub fn new(interrupts: Rc<RefCell<InterruptManager>>) -> Self {
        Self {
            interrupts,
            pressed: Vec::new(),
            p1: 0,
        }
    }

    pub fn handle(&mut self, event: ButtonEvent) {
        match event {
            ButtonEvent::Pressed(button) => {
                self.interrupts
                    .borrow_mut()
                    .request_interrupt(InterruptType::Joypad);
                if !self.pressed.contains(&button) {
                    self.pressed.push(button);
                }
            }
            ButtonEvent::Released(button) => self.pressed.retain(|&b| b != button),
        }
    }
}

impl AddressSpace for Joypad {
    fn accepts(&self, address: u16) -> bool {
        address == P1
    }

    fn read(&self, _address: u16) -> u8 {
        self.pressed
            .iter()
            .filter(|b| b.line() & self.p1 == 0)
            .fold(self.p1 | 0b1100_1111, |acc, b| acc & !b.mask())
    }

    fn write(&mut self, _address: u16, value: u8) {
        self.p1 = value & 0b0011_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joypad() -> (Joypad, Rc<RefCell<InterruptManager>>) {
        let interrupts = Rc::new(RefCell::new(InterruptManager::new(false)));
        interrupts.borrow_mut().write(0xff0f, 0);
        (Joypad::new(Rc::clone(&interrupts)), interrupts)
    }

    #[test]
    fn selected_line_shows_pressed_buttons() {
        let (mut joypad, _) = joypad();
        joypad.handle(ButtonEvent::Pressed(Button::Start));
        joypad.handle(ButtonEvent::Pressed(Button::Left));

        joypad.write(P1, P14);
        assert_eq!(joypad.read(P1), 0xd0 | 0x07, "buttons line: start");
        joypad.write(P1, P15);
        assert_eq!(joypad.read(P1), 0xe0 | 0x0d, "directions line: left");
        joypad.write(P1, 0x30);
        assert_eq!(joypad.read(P1), 0xff);
    }

    #[test]
    fn release_clears_and_press_interrupts() {
        let (mut joypad, interrupts) = joypad();
        joypad.handle(ButtonEvent::Pressed(Button::A));
        assert_ne!(interrupts.borrow().read(0xff0f) & InterruptType::Joypad.bit(), 0);
        joypad.handle(ButtonEvent::Released(Button::A));
        joypad.write(P1, P14);
        assert_eq!(joypad.read(P1), 0xdf);
    }

    #[test]
    fn queued_controller_drains() {
        let c = QueuedController::new();
        let mut handle = c.clone();
        c.push(ButtonEvent::Pressed(Button::B));
        c.push(ButtonEvent::Released(Button::B));
        assert_eq!(handle.poll().len(), 2);
        assert!(handle.poll().is_empty());
    }

    #[test]
    fn button_names_parse() {
        assert_eq!("Select".parse::<Button>(), Ok(Button::Select));
        assert!("turbo".parse::<Button>().is_err());
    }
}
