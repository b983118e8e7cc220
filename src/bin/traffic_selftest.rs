//! Traffic light bench test
//!
//! Drives the real lamps through one full cycle and an override round trip,
//! checking every transition with `assert!`. Run it with the lamps wired and
//! watch the serial log; a failed check ends in the panic handler.

#![no_std]
#![no_main]

use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_println::println;

use iot_lab::lights::{LightPattern, SignalHead, TrafficLights};
use iot_lab::proximity::{MonitorEvent, OverrideState, ProximityMonitor};
use iot_lab::traffic::{Sequencer, SequencerControl, SequencerTick, TrafficContext, TrafficState};
use iot_lab::ultrasonic::SensorError;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

const VISIBLE_MS: u32 = 500;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[PANIC] {}", info);
    loop {}
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    let delay = Delay::new();

    println!("=== Traffic light self-test ===");

    // Keep in sync with config::TRAFFIC_*_PIN
    let red = Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default());
    let yellow = Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default());
    let green = Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default());
    let mut lights = TrafficLights::new(red, yellow, green);

    println!("\n1. Initial state");
    let context = TrafficContext::new();
    let mut sequencer = Sequencer::new();
    assert!(context.is_enabled());
    assert_eq!(sequencer.get_current_state(), TrafficState::Red);
    assert_eq!(lights.get_pattern(), LightPattern::OFF);
    println!("✅ Sequencer starts at {}", sequencer.get_current_state().name());

    println!("\n2. One full cycle");
    let expected = [
        (TrafficState::Red, 5, LightPattern::RED),
        (TrafficState::Green, 10, LightPattern::GREEN),
        (TrafficState::Yellow, 1, LightPattern::YELLOW),
    ];
    for (state, hold_secs, pattern) in expected {
        let tick = sequencer.tick(&context, &mut lights);
        assert_eq!(tick, Ok(SequencerTick::Advanced { from: state, hold_secs }));
        assert_eq!(lights.get_pattern(), pattern);
        assert_eq!(lights.get_pattern().lit_count(), 1);
        println!("✅ {} lit, hold {} s", state.name(), hold_secs);
        delay.delay_millis(VISIBLE_MS);
    }
    assert_eq!(sequencer.get_cycles(), 1);
    assert_eq!(sequencer.get_current_state(), TrafficState::Red);

    println!("\n3. Override round trip");
    // Leave the sequencer mid-cycle so the restart at red is observable
    sequencer.tick(&context, &mut lights).ok();
    assert_eq!(sequencer.get_current_state(), TrafficState::Green);

    let mut monitor = ProximityMonitor::default();
    let event = monitor.handle(Ok(2.0), &mut lights, &context);
    assert_eq!(event, Ok(MonitorEvent::Unchanged { distance: 2.0 }));
    assert_eq!(monitor.get_state(), OverrideState::Normal);

    let event = monitor.handle(Ok(1.0), &mut lights, &context);
    assert_eq!(event, Ok(MonitorEvent::Alerted { distance: 1.0 }));
    assert!(!context.is_enabled());
    assert_eq!(lights.get_pattern(), LightPattern::ALERT);
    println!("✅ 1.0 m enters alert, red forced");
    delay.delay_millis(VISIBLE_MS);

    assert_eq!(sequencer.tick(&context, &mut lights), Ok(SequencerTick::Paused));
    assert_eq!(lights.get_pattern(), LightPattern::ALERT);
    println!("✅ Paused sequencer leaves the lamps alone");

    let event = monitor.handle(Err(SensorError::PingTimeout), &mut lights, &context);
    assert_eq!(event, Ok(MonitorEvent::SensorFault(SensorError::PingTimeout)));
    assert!(monitor.is_overridden());
    println!("✅ Sensor fault ignored: {}", SensorError::PingTimeout);

    let event = monitor.handle(Ok(1.0), &mut lights, &context);
    assert_eq!(event, Ok(MonitorEvent::Unchanged { distance: 1.0 }));
    assert!(monitor.is_overridden());

    let event = monitor.handle(Ok(1.01), &mut lights, &context);
    assert_eq!(event, Ok(MonitorEvent::Cleared { distance: 1.01 }));
    assert!(context.is_enabled());
    println!("✅ 1.01 m clears the alert");

    let tick = sequencer.tick(&context, &mut lights);
    assert_eq!(
        tick,
        Ok(SequencerTick::Advanced {
            from: TrafficState::Red,
            hold_secs: 5
        })
    );
    println!("✅ Sequencer restarts at red");
    delay.delay_millis(VISIBLE_MS);

    println!("\n4. Manual pause");
    context.pause();
    assert_eq!(sequencer.tick(&context, &mut lights), Ok(SequencerTick::Paused));
    context.resume();
    assert!(context.is_enabled());
    println!("✅ Pause and resume through the control trait");

    lights.show(LightPattern::OFF).ok();
    println!("\n=== All traffic light checks passed ===");

    loop {
        delay.delay_millis(1000);
    }
}
