//! Test data: RSS documents and the catalog known to the fake provider.

use super::constants::*;

/// The latest Turbo3 episode description, entity-encoded as found in the feed.
const TURBO3_LATEST_DESCRIPTION: &str = include_str!("../fixtures/turbo3_encoded.html");

/// Catalog entries for the latest Turbo3 episode, keyed by extracted
/// artist and title. Three tracks are deliberately missing.
pub const TURBO3_CATALOG: &[(&str, &str, &str)] = &[
    ("C.P.V.", "El Hombre Metrónomo", "spotify:track:cpv01"),
    ("Mala Rodríguez", "La niña", "spotify:track:mala01"),
    ("Beastie Boys", "Intergalactic", "spotify:track:beastie01"),
    ("Fidlar", "Get Off My Rock", "spotify:track:fidlar01"),
    ("Alt-J", "Breezeblocks", "spotify:track:altj01"),
    ("Miike Snow", "Genghis Khan", "spotify:track:miike01"),
    ("Bring Me The Horizon", "Obey (with YUNGBLUD)", "spotify:track:bmth01"),
    ("Shame", "Alphabet", "spotify:track:shame01"),
    ("Shame", "Concrete", "spotify:track:shame02"),
    ("The Cure", "A Forest", "spotify:track:cure01"),
];

/// Catalog entry for the only track of the older episode.
pub const OLDER_EPISODE_TRACK: (&str, &str, &str) = ("Idles", "Model Village", "spotify:track:idles01");

/// RSS document with two Turbo3 episodes, the most recent one listed last.
pub fn turbo3_feed_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Turbo 3</title>
    <link>https://www.rtve.es/play/radio/turbo-3/</link>
    <description>Turbo 3 - Radio 3</description>
    <item>
      <title>Turbo 3 - Con IDLES</title>
      <pubDate>Mon, 07 Sep 2020 18:00:00 +0200</pubDate>
      <description><![CDATA[<p>Playlist:</p><p>IDLES - Model Village</p>]]></description>
      <enclosure url="https://mvod.lvlt.rtve.es/turbo3-377.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title>{}</title>
      <pubDate>Fri, 11 Sep 2020 18:00:00 +0200</pubDate>
      <description>{}</description>
      <enclosure url="https://mvod.lvlt.rtve.es/turbo3-378.mp3" length="1" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#,
        TURBO3_LATEST_TITLE, TURBO3_LATEST_DESCRIPTION
    )
}

/// A feed whose only episode has no track listing.
pub fn talk_only_feed_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Na na na</title>
    <link>https://www.rtve.es</link>
    <description>Radio 3</description>
    <item>
      <title>Entrevista</title>
      <pubDate>Sat, 12 Sep 2020 12:00:00 +0200</pubDate>
      <description>Hoy solo hablamos.</description>
    </item>
  </channel>
</rss>"#
        .to_string()
}
