//! WiFi module for ESP32-C3 board
//!
//! Station mode with esp-wifi 0.14; addressing comes from embassy-net's
//! DHCP client.

use crate::BoardError;
use embassy_net::Stack;
use esp_println::println;
use esp_wifi::wifi::{
    AuthMethod, ClientConfiguration, Configuration, WifiController, WifiEvent,
};

/// WiFi manager for the station link
pub struct WiFiManager<'a> {
    controller: WifiController<'a>,
    is_connected: bool,
    stack: Option<Stack<'a>>,
}

impl<'a> WiFiManager<'a> {
    pub fn new(controller: WifiController<'a>) -> Self {
        Self {
            controller,
            is_connected: false,
            stack: None,
        }
    }

    /// Set the embassy-net stack used for DHCP state
    pub fn set_stack(&mut self, stack: Stack<'a>) {
        self.stack = Some(stack);
    }

    /// Join `ssid`; an empty password means an open network
    pub async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), BoardError> {
        println!("[WIFI] Connecting to WiFi network: {}", ssid);

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| BoardError::WiFiError)?,
            password: password.try_into().map_err(|_| BoardError::WiFiError)?,
            auth_method,
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| BoardError::WiFiError)?;

        if !self.controller.is_started().unwrap_or(false) {
            self.controller
                .start_async()
                .await
                .map_err(|_| BoardError::WiFiError)?;
            println!("[WIFI] Station started");
        }

        match self.controller.connect_async().await {
            Ok(()) => {
                self.is_connected = true;
                println!("[WIFI] Successfully connected to WiFi network");
                Ok(())
            }
            Err(e) => {
                println!("[WIFI] Failed to connect: {:?}", e);
                self.is_connected = false;
                Err(BoardError::WiFiError)
            }
        }
    }

    /// Park until the access point drops us
    pub async fn wait_for_disconnect(&mut self) {
        self.controller
            .wait_for_event(WifiEvent::StaDisconnected)
            .await;
        self.is_connected = false;
        println!("[WIFI] WiFi connection lost!");
    }

    /// Wait for DHCP and return the leased address
    pub async fn wait_for_ip(&self) -> Result<[u8; 4], BoardError> {
        let stack = self.stack.ok_or(BoardError::NetworkError)?;
        stack.wait_config_up().await;
        self.get_ip_address().ok_or(BoardError::NetworkError)
    }

    /// Current IP address from DHCP, if any
    pub fn get_ip_address(&self) -> Option<[u8; 4]> {
        if !self.is_connected {
            return None;
        }

        let config = self.stack.as_ref()?.config_v4()?;
        Some(config.address.address().octets())
    }

    /// Check if WiFi is connected
    pub fn is_connected(&self) -> bool {
        self.is_connected && self.controller.is_connected().unwrap_or(false)
    }
}
