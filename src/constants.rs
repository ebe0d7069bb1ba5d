/// Built-in OUI (Organizationally Unique Identifier) database in Wireshark `manuf` layout.
/// Used when no external manuf file is configured or it cannot be read.
pub const BUILTIN_OUI: &str = "\
00:00:0C\tCisco\tCisco Systems, Inc
00:01:42\tCisco\tCisco Systems, Inc
00:09:5B\tNetgear\tNetgear
00:0C:29\tVMware\tVMware, Inc.
00:0E:58\tSonos\tSonos, Inc.
00:11:32\tSynology\tSynology Incorporated
00:14:6C\tNetgear\tNetgear
00:15:5D\tMicrosof\tMicrosoft Corporation
00:17:88\tPhilipsL\tPhilips Lighting BV
00:17:F2\tApple\tApple, Inc.
00:1B:63\tApple\tApple, Inc.
00:1E:2A\tNetgear\tNetgear
00:26:BB\tApple\tApple, Inc.
00:50:56\tVMware\tVMware, Inc.
00:80:77\tBrother\tBrother Industries, Ltd.
14:91:82\tTp-LinkT\tTP-LINK TECHNOLOGIES CO.,LTD.
18:0F:76\tTp-LinkT\tTP-LINK TECHNOLOGIES CO.,LTD.
1C:40:24\tTp-LinkT\tTP-LINK TECHNOLOGIES CO.,LTD.
24:0A:C4\tEspressi\tEspressif Inc.
24:62:AB\tEspressi\tEspressif Inc.
24:A4:3C\tUbiquiti\tUbiquiti Inc
30:05:5C\tBrother\tBrother Industries, Ltd.
30:AE:A4\tEspressi\tEspressif Inc.
44:19:B6\tHangzhou\tHangzhou Hikvision Digital Technology Co.,Ltd.
58:55:CA\tApple\tApple, Inc.
5C:AA:FD\tSonos\tSonos, Inc.
68:54:FD\tAmazonTe\tAmazon Technologies Inc.
74:83:C2\tUbiquiti\tUbiquiti Inc
78:8A:20\tUbiquiti\tUbiquiti Inc
84:7E:40\tSamsungE\tSamsung Electronics Co.,Ltd
94:9F:3E\tSonos\tSonos, Inc.
A4:5E:60\tApple\tApple, Inc.
B0:A7:37\tRokuInc\tRoku, Inc.
B8:27:EB\tRaspberr\tRaspberry Pi Foundation
C0:56:E3\tHangzhou\tHangzhou Hikvision Digital Technology Co.,Ltd.
D8:3A:DD\tRaspberr\tRaspberry Pi Trading Ltd
DC:3A:5E\tRokuInc\tRoku, Inc.
DC:A6:32\tRaspberr\tRaspberry Pi Trading Ltd
E4:5F:01\tRaspberr\tRaspberry Pi Trading Ltd
EC:FA:BC\tEspressi\tEspressif Inc.
F0:27:2D\tAmazonTe\tAmazon Technologies Inc.
F0:9F:C2\tUbiquiti\tUbiquiti Inc
";

/// Signatures shipped with the binary, covering common home-network devices.
pub const BUILTIN_SIGNATURES: &str = r#"[
  {
    "id": "raspberry-pi",
    "device_type": "computer",
    "manufacturer": "Raspberry Pi Foundation",
    "model": "Raspberry Pi",
    "rules": [
      { "category": "mac_oui", "prefixes": ["B8:27:EB", "DC:A6:32", "E4:5F:01", "D8:3A:DD"], "weight": 0.7 },
      { "category": "port", "port": 22, "weight": 0.3 }
    ]
  },
  {
    "id": "synology-nas",
    "device_type": "nas",
    "manufacturer": "Synology",
    "model": "DiskStation",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:11:32"], "weight": 0.4 },
      { "category": "port", "port": 5000, "weight": 0.2 },
      { "category": "http_pattern", "pattern": "(?i)synology|diskstation", "weight": 0.4 },
      { "category": "snmp_oid", "oid": "1.3.6.1.2.1.1.1.0", "pattern": "(?i)synology", "weight": 0.2 }
    ]
  },
  {
    "id": "ubiquiti-unifi-ap",
    "device_type": "access_point",
    "manufacturer": "Ubiquiti",
    "model": "UniFi Access Point",
    "rules": [
      { "category": "mac_oui", "prefixes": ["74:83:C2", "F0:9F:C2", "24:A4:3C", "78:8A:20"], "weight": 0.5 },
      { "category": "port", "port": 22, "weight": 0.1 },
      { "category": "snmp_oid", "oid": "1.3.6.1.2.1.1.1.0", "pattern": "(?i)ubnt|unifi|\\bUAP\\b", "weight": 0.4 }
    ]
  },
  {
    "id": "tplink-router",
    "device_type": "router",
    "manufacturer": "TP-Link",
    "model": "Archer Router",
    "rules": [
      { "category": "mac_oui", "prefixes": ["14:91:82", "18:0F:76", "1C:40:24"], "weight": 0.4 },
      { "category": "port", "port": 80, "weight": 0.1 },
      { "category": "http_pattern", "pattern": "(?i)tp-?link", "weight": 0.5 }
    ]
  },
  {
    "id": "netgear-router",
    "device_type": "router",
    "manufacturer": "Netgear",
    "model": "Nighthawk Router",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:09:5B", "00:14:6C", "00:1E:2A"], "weight": 0.4 },
      { "category": "port", "port": 80, "weight": 0.1 },
      { "category": "http_pattern", "pattern": "(?i)netgear|nighthawk", "weight": 0.5 }
    ]
  },
  {
    "id": "hp-printer",
    "device_type": "printer",
    "manufacturer": "HP",
    "model": "LaserJet / OfficeJet",
    "rules": [
      { "category": "port", "port": 9100, "weight": 0.3 },
      { "category": "port", "port": 631, "weight": 0.1 },
      { "category": "http_pattern", "pattern": "(?i)hp (laserjet|officejet|deskjet)", "weight": 0.4 },
      { "category": "snmp_oid", "oid": "1.3.6.1.2.1.1.1.0", "pattern": "(?i)hp ethernet|jetdirect", "weight": 0.2 }
    ]
  },
  {
    "id": "brother-printer",
    "device_type": "printer",
    "manufacturer": "Brother",
    "model": "Network Printer",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:80:77", "30:05:5C"], "weight": 0.4 },
      { "category": "port", "port": 9100, "weight": 0.2 },
      { "category": "http_pattern", "pattern": "(?i)brother", "weight": 0.4 }
    ]
  },
  {
    "id": "google-chromecast",
    "device_type": "media_player",
    "manufacturer": "Google",
    "model": "Chromecast",
    "rules": [
      { "category": "port", "port": 8008, "weight": 0.2 },
      { "category": "port", "port": 8009, "weight": 0.2 },
      { "category": "mdns_service", "service": "_googlecast._tcp", "txt_key": "md", "txt_pattern": "(?i)chromecast", "weight": 0.6 }
    ]
  },
  {
    "id": "apple-tv",
    "device_type": "media_player",
    "manufacturer": "Apple",
    "model": "Apple TV",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:17:F2", "00:1B:63", "00:26:BB", "58:55:CA", "A4:5E:60"], "weight": 0.2 },
      { "category": "port", "port": 7000, "weight": 0.2 },
      { "category": "mdns_service", "service": "_airplay._tcp", "txt_key": "model", "txt_pattern": "(?i)appletv", "weight": 0.6 }
    ]
  },
  {
    "id": "apple-iphone",
    "device_type": "phone",
    "manufacturer": "Apple",
    "model": "iPhone",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:17:F2", "00:1B:63", "00:26:BB", "58:55:CA", "A4:5E:60"], "weight": 0.3 },
      { "category": "port", "port": 62078, "weight": 0.7 }
    ]
  },
  {
    "id": "sonos-speaker",
    "device_type": "speaker",
    "manufacturer": "Sonos",
    "model": "Sonos Speaker",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:0E:58", "5C:AA:FD", "94:9F:3E"], "weight": 0.4 },
      { "category": "port", "port": 1400, "weight": 0.3 },
      { "category": "http_pattern", "pattern": "(?i)sonos", "weight": 0.3 }
    ]
  },
  {
    "id": "philips-hue-bridge",
    "device_type": "iot_device",
    "manufacturer": "Philips",
    "model": "Hue Bridge",
    "rules": [
      { "category": "mac_oui", "prefixes": ["00:17:88"], "weight": 0.5 },
      { "category": "port", "port": 80, "weight": 0.1 },
      { "category": "http_pattern", "pattern": "(?i)philips hue|hue personal wireless lighting", "weight": 0.4 }
    ]
  },
  {
    "id": "espressif-iot",
    "device_type": "iot_device",
    "manufacturer": "Espressif",
    "model": "ESP8266/ESP32 Module",
    "rules": [
      { "category": "mac_oui", "prefixes": ["24:0A:C4", "EC:FA:BC", "24:62:AB", "30:AE:A4"], "weight": 0.6 },
      { "category": "port", "port": 80, "weight": 0.1 },
      { "category": "http_pattern", "pattern": "(?i)tasmota|esphome", "weight": 0.3 }
    ]
  },
  {
    "id": "hikvision-camera",
    "device_type": "camera",
    "manufacturer": "Hikvision",
    "model": "IP Camera",
    "rules": [
      { "category": "mac_oui", "prefixes": ["44:19:B6", "C0:56:E3"], "weight": 0.4 },
      { "category": "port", "port": 554, "weight": 0.3 },
      { "category": "http_pattern", "pattern": "(?i)hikvision|webcomponents", "weight": 0.3 }
    ]
  },
  {
    "id": "roku-player",
    "device_type": "media_player",
    "manufacturer": "Roku",
    "model": "Roku Streaming Player",
    "rules": [
      { "category": "mac_oui", "prefixes": ["B0:A7:37", "DC:3A:5E"], "weight": 0.4 },
      { "category": "port", "port": 8060, "weight": 0.3 },
      { "category": "http_pattern", "pattern": "(?i)roku", "weight": 0.3 }
    ]
  },
  {
    "id": "amazon-echo",
    "device_type": "speaker",
    "manufacturer": "Amazon",
    "model": "Echo",
    "rules": [
      { "category": "mac_oui", "prefixes": ["68:54:FD", "F0:27:2D"], "weight": 0.5 },
      { "category": "mdns_service", "service": "_amzn-wplay._tcp", "weight": 0.5 }
    ]
  },
  {
    "id": "windows-pc",
    "device_type": "computer",
    "manufacturer": "Microsoft",
    "model": "Windows PC",
    "rules": [
      { "category": "port", "port": 445, "weight": 0.5 },
      { "category": "port", "port": 139, "weight": 0.3 },
      { "category": "port", "port": 3389, "weight": 0.2 }
    ]
  }
]"#;
