/*!

This is the long-form manual for `council_tally` and `cityvotes`.

## Input files

The build reads a directory of quarterly CSV exports following the naming
convention `{City}-{State}-{Year}-Q{Quarter}-{Type}.csv`, with three types:

* `Votes` every agenda item of the period, one row per item, with one
  column per council member holding that member's raw vote token.
* `Voted-Items` the subset of `Votes` rows that carry a roll call. It is
  derived data and is not read by the build.
* `Persons` the roster snapshot for the period: district, voter name,
  title, first/last seen dates and a vote count.

The year filter (`--years`) selects files by the 4-digit year preceding
`-Q<digit>` in the name. Files without a recognizable year are treated as
undated and always included.

### Votes layout

The fixed columns come first, in this order: meeting metadata (`event_id`,
`event_date`, `event_time`, `event_body`, `event_location`), agenda item
metadata (`event_item_id`, `agenda_number`, `agenda_sequence`, `title`),
matter metadata (`matter_file`, `matter_type`, `matter_status`,
`matter_id`, `matter_title`, `matter_intro_date`,
`matter_enactment_number`, `matter_requester`, `matter_body_name`),
outcome fields (`passed`, `vote_type`, `consent`, `tally`, `mover`,
`seconder`, `roll_call_flag`), vote-source fields (`socrata_item_number`,
`socrata_agenda_info`, `socrata_final_action`) and links (`agenda_link`,
`minutes_link`, `video_link`, pipe-delimited `attachment_links`). Every
remaining header is a member column.

## Vote tokens

The recognized raw tokens and their normalized values:

| token      | value          |
|------------|----------------|
| `YES`      | AYE            |
| `NO`       | NAY            |
| `AWVT`     | ABSENT         |
| `ABSNT`    | ABSENT         |
| `ABSNT_CB` | ABSENT         |
| `ABST`     | ABSTAIN        |
| `N/A`      | NOT_APPLICABLE |
| empty      | EMPTY          |

Anything else surfaces as `UNKNOWN_CODE` and is listed in the build
summary; it is never coerced to a real vote.

## Name aliases

Member names arrive with inconsistent spacing and spelling. The built-in
alias table resolves the known variants; pass `--aliases <file>` with a
JSON object of `"raw variant": "canonical name"` pairs to extend it.
Variants that resolve through neither route are flagged in the build
summary so the table can be maintained by hand. They are never inferred,
because a wrong merge silently folds two people into one record.

## Matching

Roll calls are joined to agenda items by date and normalized agenda
number (trailing periods and leading zeros are not significant). Roll
calls with no number match on the same date by title similarity; the
acceptance threshold defaults to 0.85 and can be tuned with
`--match-threshold`. Unmatched roll calls are kept as synthetic agenda
items with empty legislative metadata, so closed-session votes that never
appear on a published agenda still reach the output.

## Current members

Pairwise alignment is only computed for currently-seated members. Two
definitions are available via `--current-rule`:

* `latest-roster` (default) a member listed in the most recent Persons
  snapshot within the year filter.
* `last-seen` a member whose merged last-seen date equals the newest
  last-seen date in the filtered data.

*/
