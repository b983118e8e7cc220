#![no_std]

//! ESP32-C3 IoT lab exercises
//!
//! Board-independent logic for four small firmware exercises: a button driven
//! binary counter, an interrupt driven LED chase, a traffic light gated by an
//! ultrasonic proximity sensor and a distance sensor publishing over MQTT.
//! The firmware entry points live in `src/bin/` and need the `board` feature.

pub mod chase;
pub mod counter;
pub mod lights;
pub mod mqtt;
pub mod proximity;
pub mod telemetry;
pub mod traffic;
pub mod ultrasonic;
#[cfg(feature = "board")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Compile-time configuration
pub mod config {
    /// Binary counter: push button (active low)
    pub const COUNTER_BUTTON_PIN: u8 = 9;
    /// Binary counter: LED1..LED4, least significant bit first
    pub const COUNTER_LED_PINS: [u8; 4] = [0, 1, 2, 3];
    /// Binary counter refresh period
    pub const COUNTER_PERIOD_MS: u64 = 500;

    /// LED chase: "back" button, moves the lit LED towards LED1
    pub const CHASE_BACK_BUTTON_PIN: u8 = 9;
    /// LED chase: "go" button, moves the lit LED towards LED8
    pub const CHASE_GO_BUTTON_PIN: u8 = 10;
    /// LED chase: LED1..LED8
    pub const CHASE_LED_PINS: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
    /// LED chase step period
    pub const CHASE_PERIOD_MS: u64 = 1000;

    /// Traffic light outputs
    pub const TRAFFIC_RED_PIN: u8 = 3;
    pub const TRAFFIC_YELLOW_PIN: u8 = 4;
    pub const TRAFFIC_GREEN_PIN: u8 = 5;

    /// HC-SR04 pins, shared by the traffic light and telemetry exercises
    pub const ULTRASONIC_TRIGGER_PIN: u8 = 6;
    pub const ULTRASONIC_ECHO_PIN: u8 = 7;
    /// Maximum measured range in meters (400 cm)
    pub const ULTRASONIC_MAX_DISTANCE_M: f32 = 4.0;

    /// Proximity override threshold in meters
    pub const PROXIMITY_THRESHOLD_M: f32 = 1.0;
    /// Monitor polling interval
    pub const MONITOR_PERIOD_MS: u64 = 200;
    /// How often a paused sequencer re-checks its enable flag
    pub const SEQUENCER_POLL_MS: u64 = 50;

    /// Telemetry sensor sampling period
    pub const TELEMETRY_SAMPLE_PERIOD_MS: u64 = 1000;
    /// How long the publisher waits for a fresh reading
    pub const TELEMETRY_WAIT_TIMEOUT_MS: u64 = 3000;
    /// Pause after each publish
    pub const TELEMETRY_PUBLISH_PERIOD_MS: u64 = 1000;

    /// MQTT broker
    pub const MQTT_BROKER_HOST: &str = "test.mosquitto.org";
    pub const MQTT_BROKER_PORT: u16 = 1883;
    /// Topic the distance (in centimeters) is published to
    pub const MQTT_TOPIC: &str = "topic/distancia/sensor";
    /// Keep-alive advertised in CONNECT, in seconds
    pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;
    /// Delay before reconnecting after a broker error
    pub const MQTT_RECONNECT_INTERVAL_MS: u64 = 5000;

    /// WiFi configuration
    /// Read from environment variables at compile time
    pub const WIFI_SSID: &str = env!("WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

    /// WiFi reconnection interval in milliseconds
    pub const WIFI_RECONNECT_INTERVAL_MS: u64 = 5000;
}

/// Error types for the lab board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// GPIO write/read failed
    Gpio,
    /// WiFi connection error
    WiFiError,
    /// DNS, TCP or DHCP error
    NetworkError,
    /// Broker refused or dropped the session
    MqttError,
    /// Malformed packet or buffer too small
    ProtocolError,
}
